//! Context: owner of canonical types, variables and interned expressions

use super::{FloatPrecision, Type, TypeKind};
use crate::error::{Error, Result};
use crate::expr::ExprTable;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Named, typed symbol. Unique by qualified name within its context.
struct VariableData {
    name: String,
    ty: Type,
}

/// Handle to a context-owned variable. Compared by identity.
#[derive(Clone)]
pub struct Variable(Arc<VariableData>);

impl Variable {
    /// Fully qualified name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared type
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.ty())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Process-scoped authority over types, variables and expression sharing.
///
/// Canonicalization tables sit behind locks, so a context may be shared
/// between threads through an `Arc`. Lookups and inserts for one shape are
/// serialized by the table lock.
pub struct Context {
    types: RwLock<FxHashMap<TypeKind, Type>>,
    variables: RwLock<FxHashMap<String, Variable>>,
    exprs: ExprTable,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            types: RwLock::new(FxHashMap::default()),
            variables: RwLock::new(FxHashMap::default()),
            exprs: ExprTable::new(),
        }
    }

    // Types
    //-------------------------------------------------------------------------

    /// Return the canonical instance for a shape, creating it on first request.
    ///
    /// Fails for bit-vectors of width 0, tuples with fewer than two members and
    /// composites whose subtypes were not created by this context.
    pub fn get_or_create_type(&self, kind: TypeKind) -> Result<Type> {
        match &kind {
            TypeKind::Bv { width: 0 } => {
                return Err(Error::InvalidType(
                    "bit-vector width must be at least 1".to_string(),
                ))
            }
            TypeKind::Tuple(members) if members.len() < 2 => {
                return Err(Error::InvalidType(format!(
                    "tuple types need at least 2 members, got {}",
                    members.len()
                )))
            }
            TypeKind::Array { index, elem } => {
                self.check_owned(index)?;
                self.check_owned(elem)?;
            }
            TypeKind::Tuple(members) => {
                for member in members {
                    self.check_owned(member)?;
                }
            }
            TypeKind::Function { result, params } => {
                self.check_owned(result)?;
                for param in params {
                    self.check_owned(param)?;
                }
            }
            _ => {}
        }

        Ok(self.canonical(kind))
    }

    fn check_owned(&self, ty: &Type) -> Result<()> {
        match self.types.read().get(ty.kind()) {
            Some(owned) if owned == ty => Ok(()),
            _ => Err(Error::InvalidType(format!(
                "subtype {} belongs to another context",
                ty
            ))),
        }
    }

    fn canonical(&self, kind: TypeKind) -> Type {
        if let Some(ty) = self.types.read().get(&kind) {
            return ty.clone();
        }

        let mut types = self.types.write();
        types
            .entry(kind.clone())
            .or_insert_with(|| Type::from_kind(kind))
            .clone()
    }

    /// The boolean type
    pub fn bool_type(&self) -> Type {
        self.canonical(TypeKind::Bool)
    }

    /// The unbounded integer type
    pub fn int_type(&self) -> Type {
        self.canonical(TypeKind::Int)
    }

    /// The real type
    pub fn real_type(&self) -> Type {
        self.canonical(TypeKind::Real)
    }

    /// Bit-vector type of the given width
    ///
    /// # Panics
    /// If `width` is zero.
    pub fn bv_type(&self, width: u32) -> Type {
        assert!(width > 0, "bit-vector width must be at least 1");
        self.canonical(TypeKind::Bv { width })
    }

    /// Floating point type of the given precision
    pub fn float_type(&self, precision: FloatPrecision) -> Type {
        self.canonical(TypeKind::Float(precision))
    }

    /// Array type from `index` to `elem`
    pub fn array_type(&self, index: Type, elem: Type) -> Result<Type> {
        self.get_or_create_type(TypeKind::Array { index, elem })
    }

    /// Tuple type; requires at least two members
    pub fn tuple_type(&self, members: Vec<Type>) -> Result<Type> {
        self.get_or_create_type(TypeKind::Tuple(members))
    }

    /// Function type
    pub fn function_type(&self, result: Type, params: Vec<Type>) -> Result<Type> {
        self.get_or_create_type(TypeKind::Function { result, params })
    }

    /// Number of distinct types created so far
    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }

    // Variables
    //-------------------------------------------------------------------------

    /// Register a new variable. Fails if `name` is already taken.
    pub fn create_variable(&self, name: impl Into<String>, ty: Type) -> Result<Variable> {
        let name = name.into();
        let mut variables = self.variables.write();
        if variables.contains_key(&name) {
            return Err(Error::DuplicateVariable { name });
        }

        let variable = Variable(Arc::new(VariableData {
            name: name.clone(),
            ty,
        }));
        variables.insert(name, variable.clone());

        Ok(variable)
    }

    /// Look up a variable by its qualified name
    pub fn get_variable(&self, name: &str) -> Option<Variable> {
        self.variables.read().get(name).cloned()
    }

    /// Check whether a qualified name is taken
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }

    /// Number of registered variables
    pub fn variable_count(&self) -> usize {
        self.variables.read().len()
    }

    pub(crate) fn exprs(&self) -> &ExprTable {
        &self.exprs
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("types", &self.type_count())
            .field("variables", &self.variable_count())
            .finish()
    }
}
