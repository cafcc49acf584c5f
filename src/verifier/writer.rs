//! Model writer for the external checker
//!
//! Emits the flattened main automaton as a single `main process` and records
//! every emitted name in a [`NameMapping`]. Error locations are written as
//! plain locations; each edge entering one assigns the location's error code
//! to a dedicated error-field variable, and an unconditional edge leads on
//! to a single synthetic `error loc` sink.

use super::GENERAL_FAILURE_CODE;
use crate::automaton::{AutomataSystem, Cfa, InlineMap, LocId, LocationRef};
use crate::error::{Error, Result};
use crate::expr::{ExprBuilder, ExprPrinter, ExprRef, Literal, PrintStyle};
use crate::types::{Type, TypeKind, Variable};
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex =
        Regex::new(r"[^A-Za-z0-9_]").expect("name sanitizer pattern is valid");
}

const ERROR_FIELD_NAME: &str = "__error_field";
const ERROR_SINK_NAME: &str = "__error";

/// Correspondence between emitted names and program entities
#[derive(Debug, Clone)]
pub struct NameMapping {
    locations: FxHashMap<String, LocId>,
    variables: FxHashMap<String, Variable>,
    inline: InlineMap,
    error_field: Option<Variable>,
    error_sink: Option<String>,
}

impl NameMapping {
    /// Empty mapping over a flattened automaton described by `inline`
    pub fn new(inline: InlineMap) -> Self {
        Self {
            locations: FxHashMap::default(),
            variables: FxHashMap::default(),
            inline,
            error_field: None,
            error_sink: None,
        }
    }

    /// Record an emitted location name
    pub fn insert_location(&mut self, name: impl Into<String>, loc: LocId) {
        self.locations.insert(name.into(), loc);
    }

    /// Record an emitted variable name
    pub fn insert_variable(&mut self, name: impl Into<String>, variable: Variable) {
        self.variables.insert(name.into(), variable);
    }

    /// Designate the variable holding the error code
    pub fn set_error_field(&mut self, variable: Variable) {
        self.error_field = Some(variable);
    }

    /// Name of the synthetic error location, which has no program counterpart
    pub fn set_error_sink(&mut self, name: impl Into<String>) {
        self.error_sink = Some(name.into());
    }

    /// Location of the flattened automaton emitted as `name`
    pub fn location(&self, name: &str) -> Option<LocId> {
        self.locations.get(name).copied()
    }

    /// Variable of the flattened automaton emitted as `name`
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Pre-inlining location emitted as `name`
    pub fn original_location(&self, name: &str) -> Option<LocationRef> {
        self.location(name)
            .map(|loc| self.inline.original_location(loc))
    }

    /// Pre-inlining variable emitted as `name`
    pub fn original_variable(&self, name: &str) -> Option<Variable> {
        self.variable(name)
            .map(|v| self.inline.original_variable(v))
    }

    /// The error-field variable
    pub fn error_field(&self) -> Option<&Variable> {
        self.error_field.as_ref()
    }

    /// Check if `name` is the synthetic error location
    pub fn is_error_sink(&self, name: &str) -> bool {
        self.error_sink.as_deref() == Some(name)
    }

    /// Inlining record of the flattened automaton
    pub fn inline_map(&self) -> &InlineMap {
        &self.inline
    }

    /// Number of mapped locations
    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    /// Number of mapped variables
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`
pub fn sanitize_name(name: &str) -> String {
    let sanitized = INVALID_NAME_CHARS.replace_all(name, "_");
    match sanitized.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => sanitized.into_owned(),
        _ => format!("_{}", sanitized),
    }
}

/// Writes a flattened automata system in the checker's input language
pub struct CfaWriter<'a> {
    system: &'a AutomataSystem,
    inline: InlineMap,
    used: FxHashSet<String>,
}

impl<'a> CfaWriter<'a> {
    /// Writer for the automaton `inline.main()` of `system`
    pub fn new(system: &'a AutomataSystem, inline: InlineMap) -> Self {
        Self {
            system,
            inline,
            used: FxHashSet::default(),
        }
    }

    fn unique_name(&mut self, base: &str) -> String {
        let base = sanitize_name(base);
        let mut candidate = base.clone();
        let mut counter = 0;
        while !self.used.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{}_{}", base, counter);
        }
        candidate
    }

    /// Emit the model and return the names it used
    pub fn write(mut self, out: &mut dyn Write) -> Result<NameMapping> {
        let system = self.system;
        let cfa = system.get(self.inline.main()).ok_or(Error::NoMainAutomaton)?;

        if cfa.transitions().any(|t| t.is_call() && t.is_connected()) {
            return Err(Error::internal(format!(
                "automaton '{}' still contains call transitions",
                cfa.name()
            )));
        }

        let builder = ExprBuilder::new(system.context().clone());
        let error_type = error_field_type(cfa)?;
        let error_field = self.create_error_field(cfa, &error_type)?;
        let general_failure = match error_type.kind() {
            TypeKind::Bv { width } => builder.bv_lit(GENERAL_FAILURE_CODE, *width),
            _ => builder.int_lit(i64::from(GENERAL_FAILURE_CODE)),
        };

        let mut mapping = NameMapping::new(self.inline.clone());
        let mut var_names: FxHashMap<Variable, String> = FxHashMap::default();

        let process = self.unique_name(cfa.name());
        writeln!(out, "main process {} {{", process)?;

        let members = cfa
            .inputs()
            .iter()
            .chain(cfa.locals())
            .chain(std::iter::once(&error_field));
        for variable in members {
            let name = self.unique_name(variable.name());
            writeln!(out, "    var {} : {}", name, model_type(variable.ty())?)?;
            var_names.insert(variable.clone(), name.clone());
            mapping.insert_variable(name, variable.clone());
        }
        mapping.set_error_field(error_field.clone());

        let mut loc_names: FxHashMap<LocId, String> = FxHashMap::default();
        for loc in cfa.locations() {
            let name = self.unique_name(&format!("loc{}", loc.id().0));
            let keyword = if loc.id() == cfa.entry() {
                "init loc"
            } else if loc.id() == cfa.exit() {
                "final loc"
            } else {
                "loc"
            };
            writeln!(out, "    {} {}", keyword, name)?;
            loc_names.insert(loc.id(), name.clone());
            mapping.insert_location(name, loc.id());
        }

        let sink = self.unique_name(ERROR_SINK_NAME);
        writeln!(out, "    error loc {}", sink)?;
        mapping.set_error_sink(sink.clone());

        let namer = |v: &Variable| {
            var_names
                .get(v)
                .cloned()
                .unwrap_or_else(|| sanitize_name(v.name()))
        };
        let printer = ExprPrinter::new(PrintStyle::Model).with_namer(&namer);
        let field_name = namer(&error_field);

        for edge in cfa.transitions() {
            let (Some(source), Some(target)) = (edge.source(), edge.target()) else {
                continue;
            };

            writeln!(out, "    {} -> {} {{", loc_names[&source], loc_names[&target])?;
            if edge.guard().as_literal() != Some(&Literal::Bool(true)) {
                writeln!(out, "        assume {}", printer.print(edge.guard()))?;
            }
            for assignment in edge.assignments() {
                writeln!(
                    out,
                    "        {} := {}",
                    namer(assignment.variable()),
                    printer.print(assignment.value())
                )?;
            }
            if cfa.location(target).is_some_and(|l| l.is_error()) {
                let code = error_code(cfa, target, &general_failure);
                writeln!(out, "        {} := {}", field_name, printer.print(&code))?;
            }
            writeln!(out, "    }}")?;
        }

        for loc in cfa.error_locations() {
            writeln!(out, "    {} -> {} {{", loc_names[loc], sink)?;
            writeln!(out, "    }}")?;
        }

        writeln!(out, "}}")?;

        tracing::debug!(
            process = %process,
            locations = mapping.num_locations(),
            variables = mapping.num_variables(),
            "model written"
        );

        Ok(mapping)
    }

    /// The error field of `cfa`. A field left by an earlier write is reused
    /// when its type still fits and the automaton does not declare it.
    fn create_error_field(&mut self, cfa: &Cfa, ty: &Type) -> Result<Variable> {
        let ctx = self.system.context();
        let base = format!("{}/{}", cfa.name(), ERROR_FIELD_NAME);
        let mut candidate = base.clone();
        let mut counter = 0;
        loop {
            match ctx.get_variable(&candidate) {
                Some(existing) if existing.ty() == ty && cfa.simple_name(&existing).is_none() => {
                    return Ok(existing)
                }
                Some(_) => {}
                None => match ctx.create_variable(candidate.clone(), ty.clone()) {
                    Ok(variable) => return Ok(variable),
                    Err(Error::DuplicateVariable { .. }) => {}
                    Err(e) => return Err(e),
                },
            }
            counter += 1;
            candidate = format!("{}_{}", base, counter);
        }
    }
}

fn error_code(cfa: &Cfa, loc: LocId, general_failure: &ExprRef) -> ExprRef {
    cfa.error_code_expr(loc)
        .cloned()
        .unwrap_or_else(|| general_failure.clone())
}

/// Common type of all error codes; Int when there are none
fn error_field_type(cfa: &Cfa) -> Result<Type> {
    let mut found: Option<Type> = None;
    for loc in cfa.error_locations() {
        let Some(code) = cfa.error_code_expr(*loc) else {
            continue;
        };
        let ty = code.ty();
        if !(ty.is_int() || ty.is_bv()) {
            return Err(Error::InvalidType(format!(
                "error code of {} has type {}, expected Int or Bv",
                loc, ty
            )));
        }
        match &found {
            Some(prev) if prev != ty => {
                return Err(Error::type_mismatch(prev.to_string(), ty.to_string()));
            }
            _ => found = Some(ty.clone()),
        }
    }
    Ok(found.unwrap_or_else(|| cfa.context().int_type()))
}

fn model_type(ty: &Type) -> Result<String> {
    match ty.kind() {
        TypeKind::Bool => Ok("bool".to_string()),
        TypeKind::Int => Ok("int".to_string()),
        TypeKind::Real => Ok("rat".to_string()),
        TypeKind::Bv { width } => Ok(format!("bv[{}]", width)),
        _ => Err(Error::InvalidType(format!(
            "type {} has no model representation",
            ty
        ))),
    }
}
