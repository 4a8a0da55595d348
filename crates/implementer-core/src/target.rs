//! Target type descriptors.
//!
//! A [`TargetType`] describes the interface or class being implemented: its
//! bindable members in declaration order and its properties. Property
//! accessors are members in their own right, so every bindable entry point
//! has a [`MemberId`].
//!
//! # Example
//!
//! ```
//! use implementer_core::{DataType, TargetType};
//!
//! let target = TargetType::interface("ITest")
//!     .method("void test()")?
//!     .method("int add(int a, int b)")?
//!     .property("string Prop1 { get; set; }")?
//!     .property("int Prop2 { get; }")?
//!     .build();
//!
//! assert!(target.is_interface());
//! assert_eq!(target.members().len(), 5);
//! assert!(target.property("Prop2").unwrap().is_read_only());
//! # Ok::<(), implementer_core::DeclarationError>(())
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::decl::{parse_method, parse_property, validate_params};
use crate::error::DeclarationError;
use crate::{DataType, NativeFn, TypeHash};

/// Index of a member within its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub usize);

/// Index of a property within its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub usize);

/// Whether the target is a pure contract or a type with behavior of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// No base behavior; unbound members no-op or are unavailable.
    Interface,
    /// Members may carry base bodies used when left unbound.
    Class,
}

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub data_type: DataType,
}

impl Param {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// What kind of entry point a member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Getter(PropertyId),
    Setter(PropertyId),
}

/// One bindable member of a target.
#[derive(Debug, Clone)]
pub struct MemberDef {
    pub id: MemberId,
    /// Method name, or the property name for accessors
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: DataType,
    pub kind: MemberKind,
    pub hash: TypeHash,
    base: Option<NativeFn>,
}

impl MemberDef {
    /// Name used in slot names and diagnostics (`get_Name` / `set_Name` for accessors).
    pub fn display_name(&self) -> String {
        match self.kind {
            MemberKind::Method => self.name.clone(),
            MemberKind::Getter(_) => format!("get_{}", self.name),
            MemberKind::Setter(_) => format!("set_{}", self.name),
        }
    }

    /// Full signature, e.g. `int add(int a, int b)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.data_type, p.name))
            .collect();
        format!(
            "{} {}({})",
            self.return_type,
            self.display_name(),
            params.join(", ")
        )
    }

    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.data_type).collect()
    }

    /// Whether `types` match this member's parameter types exactly.
    pub fn matches_params(&self, types: &[DataType]) -> bool {
        self.params.len() == types.len()
            && self
                .params
                .iter()
                .zip(types)
                .all(|(p, t)| p.data_type.accepts(*t) && t.accepts(p.data_type))
    }

    pub fn is_void(&self) -> bool {
        self.return_type.is_void()
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, MemberKind::Method)
    }

    /// Base body for class targets.
    pub fn base(&self) -> Option<&NativeFn> {
        self.base.as_ref()
    }
}

impl fmt::Display for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// A property and its accessor members.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub id: PropertyId,
    pub name: String,
    pub data_type: DataType,
    pub getter: Option<MemberId>,
    pub setter: Option<MemberId>,
}

impl PropertyDef {
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    pub fn is_write_only(&self) -> bool {
        self.getter.is_none()
    }
}

/// A target whose members another target inherits.
#[derive(Debug, Clone)]
pub struct BaseTarget {
    pub target: Arc<TargetType>,
    /// Id in the inheriting target of each base member, indexed by the base's ids
    pub members: Vec<MemberId>,
}

/// The interface or class being implemented.
///
/// Immutable once built; sessions share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TargetType {
    name: String,
    hash: TypeHash,
    kind: TargetKind,
    members: Vec<MemberDef>,
    properties: Vec<PropertyDef>,
    methods_by_name: FxHashMap<String, Vec<MemberId>>,
    bases: Vec<BaseTarget>,
}

impl TargetType {
    /// Start describing an interface.
    pub fn interface(name: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(name.into(), TargetKind::Interface)
    }

    /// Start describing a class.
    pub fn class(name: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(name.into(), TargetKind::Class)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TargetKind::Interface
    }

    /// All members, accessors included, in declaration order.
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberDef> {
        self.members.get(id.0)
    }

    /// Plain methods (no accessors) in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &MemberDef> {
        self.members.iter().filter(|m| m.is_method())
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// All methods sharing a name.
    pub fn overloads(&self, name: &str) -> &[MemberId] {
        self.methods_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The method with this name and exact parameter types.
    pub fn find_method(&self, name: &str, params: &[DataType]) -> Option<MemberId> {
        self.overloads(name)
            .iter()
            .copied()
            .find(|id| self.members[id.0].matches_params(params))
    }

    /// Every inherited target, direct or indirect.
    pub fn bases(&self) -> &[BaseTarget] {
        &self.bases
    }

    /// Map from `base`'s member ids to this target's, when `base` is inherited.
    pub fn upcast(&self, base: &TargetType) -> Option<&[MemberId]> {
        self.bases
            .iter()
            .find(|b| std::ptr::eq(Arc::as_ptr(&b.target), base))
            .map(|b| b.members.as_slice())
    }

    /// Whether an implementation of this target also implements `other`.
    pub fn includes(&self, other: &TargetType) -> bool {
        std::ptr::eq(self, other) || self.upcast(other).is_some()
    }
}

/// Builder for [`TargetType`].
///
/// Declaration methods consume and return the builder so descriptions chain
/// with `?`.
#[derive(Debug)]
pub struct TargetBuilder {
    name: String,
    hash: TypeHash,
    kind: TargetKind,
    members: Vec<MemberDef>,
    properties: Vec<PropertyDef>,
    aliases: FxHashMap<String, DataType>,
    bases: Vec<BaseTarget>,
}

impl TargetBuilder {
    fn new(name: String, kind: TargetKind) -> Self {
        Self {
            hash: TypeHash::from_name(&name),
            name,
            kind,
            members: Vec::new(),
            properties: Vec::new(),
            aliases: FxHashMap::default(),
            bases: Vec::new(),
        }
    }

    /// Make a native type usable in declarations under `name`.
    pub fn with_type<T: 'static>(mut self, name: &'static str) -> Self {
        self.aliases.insert(
            name.to_string(),
            DataType::Native {
                name,
                type_id: TypeId::of::<T>(),
            },
        );
        self
    }

    /// Declare a method, e.g. `"int add(int a, int b)"`.
    pub fn method(self, decl: &str) -> Result<Self, DeclarationError> {
        let parsed = parse_method(decl, |name| self.resolve(name))?;
        self.method_sig(parsed.name, parsed.params, parsed.return_type)
    }

    /// Declare a method from its parts.
    pub fn method_sig(
        mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: DataType,
    ) -> Result<Self, DeclarationError> {
        let name = name.into();
        validate_params(&name, &params)?;
        self.push_member(name, params, return_type, MemberKind::Method, None)?;
        Ok(self)
    }

    /// Declare a class method with a base body, used when the member is left unbound.
    pub fn virtual_method(self, decl: &str, body: NativeFn) -> Result<Self, DeclarationError> {
        let parsed = parse_method(decl, |name| self.resolve(name))?;
        let mut this = self;
        this.require_class(&parsed.name)?;
        this.push_member(
            parsed.name,
            parsed.params,
            parsed.return_type,
            MemberKind::Method,
            Some(body),
        )?;
        Ok(this)
    }

    /// Declare a property, e.g. `"string Name { get; set; }"`.
    pub fn property(self, decl: &str) -> Result<Self, DeclarationError> {
        let parsed = parse_property(decl, |name| self.resolve(name))?;
        self.property_sig(parsed.name, parsed.data_type, parsed.get, parsed.set)
    }

    /// Declare a property from its parts.
    pub fn property_sig(
        self,
        name: impl Into<String>,
        data_type: DataType,
        get: bool,
        set: bool,
    ) -> Result<Self, DeclarationError> {
        let name = name.into();
        if !get && !set {
            return Err(DeclarationError::NoAccessors { name });
        }
        self.push_property(name, data_type, get.then_some(None), set.then_some(None))
    }

    /// Declare a class property whose accessors carry base bodies.
    ///
    /// An accessor declared in `decl` but given no body behaves like an
    /// interface accessor when unbound.
    pub fn virtual_property(
        self,
        decl: &str,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    ) -> Result<Self, DeclarationError> {
        let parsed = parse_property(decl, |name| self.resolve(name))?;
        let mut this = self;
        this.require_class(&parsed.name)?;
        this.push_property(
            parsed.name,
            parsed.data_type,
            parsed.get.then_some(getter),
            parsed.set.then_some(setter),
        )
    }

    /// Take on every member and property of `base`.
    ///
    /// Inherited members keep their base bodies and get ids in this target.
    /// A base reached twice, directly or through another base, contributes
    /// its members once.
    pub fn inherit(mut self, base: Arc<TargetType>) -> Result<Self, DeclarationError> {
        if self.bases.iter().any(|b| Arc::ptr_eq(&b.target, &base)) {
            return Ok(self);
        }

        let mut mapped: Vec<Option<MemberId>> = vec![None; base.members.len()];
        for ancestor in &base.bases {
            if let Some(known) = self
                .bases
                .iter()
                .find(|b| Arc::ptr_eq(&b.target, &ancestor.target))
            {
                for (in_base, here) in ancestor.members.iter().zip(&known.members) {
                    mapped[in_base.0] = Some(*here);
                }
            }
        }

        let mut properties: Vec<Option<PropertyId>> = vec![None; base.properties.len()];
        for member in &base.members {
            if mapped[member.id.0].is_some() {
                continue;
            }
            let kind = match member.kind {
                MemberKind::Method => MemberKind::Method,
                MemberKind::Getter(p) => {
                    MemberKind::Getter(self.inherit_property(&base.properties[p.0], &mut properties)?)
                }
                MemberKind::Setter(p) => {
                    MemberKind::Setter(self.inherit_property(&base.properties[p.0], &mut properties)?)
                }
            };
            if member.base.is_some() {
                self.require_class(&member.display_name())?;
            }
            let id = self.push_member(
                member.name.clone(),
                member.params.clone(),
                member.return_type,
                kind,
                member.base.clone(),
            )?;
            match kind {
                MemberKind::Getter(p) => self.properties[p.0].getter = Some(id),
                MemberKind::Setter(p) => self.properties[p.0].setter = Some(id),
                MemberKind::Method => {}
            }
            mapped[member.id.0] = Some(id);
        }

        let members: Vec<MemberId> = mapped.into_iter().flatten().collect();
        let ancestors: Vec<BaseTarget> = base
            .bases
            .iter()
            .filter(|a| !self.bases.iter().any(|b| Arc::ptr_eq(&b.target, &a.target)))
            .map(|a| BaseTarget {
                target: Arc::clone(&a.target),
                members: a.members.iter().map(|id| members[id.0]).collect(),
            })
            .collect();
        self.bases.push(BaseTarget {
            target: base,
            members,
        });
        self.bases.extend(ancestors);
        Ok(self)
    }

    pub fn build(self) -> TargetType {
        let mut methods_by_name: FxHashMap<String, Vec<MemberId>> = FxHashMap::default();
        for member in self.members.iter().filter(|m| m.is_method()) {
            methods_by_name
                .entry(member.name.clone())
                .or_default()
                .push(member.id);
        }

        TargetType {
            name: self.name,
            hash: self.hash,
            kind: self.kind,
            members: self.members,
            properties: self.properties,
            methods_by_name,
            bases: self.bases,
        }
    }

    fn resolve(&self, name: &str) -> Option<DataType> {
        DataType::from_name(name).or_else(|| self.aliases.get(name).copied())
    }

    fn require_class(&self, member: &str) -> Result<(), DeclarationError> {
        if self.kind == TargetKind::Interface {
            return Err(DeclarationError::BodyOnInterface {
                target: self.name.clone(),
                member: member.to_string(),
            });
        }
        Ok(())
    }

    fn push_property(
        mut self,
        name: String,
        data_type: DataType,
        getter: Option<Option<NativeFn>>,
        setter: Option<Option<NativeFn>>,
    ) -> Result<Self, DeclarationError> {
        if self.properties.iter().any(|p| p.name == name) {
            return Err(DeclarationError::DuplicateProperty {
                target: self.name.clone(),
                name,
            });
        }

        let id = PropertyId(self.properties.len());
        let getter = match getter {
            Some(base) => Some(self.push_member(
                name.clone(),
                Vec::new(),
                data_type,
                MemberKind::Getter(id),
                base,
            )?),
            None => None,
        };
        let setter = match setter {
            Some(base) => Some(self.push_member(
                name.clone(),
                vec![Param::new("value", data_type)],
                DataType::Void,
                MemberKind::Setter(id),
                base,
            )?),
            None => None,
        };

        self.properties.push(PropertyDef {
            id,
            name,
            data_type,
            getter,
            setter,
        });
        Ok(self)
    }

    fn inherit_property(
        &mut self,
        property: &PropertyDef,
        inherited: &mut [Option<PropertyId>],
    ) -> Result<PropertyId, DeclarationError> {
        if let Some(id) = inherited[property.id.0] {
            return Ok(id);
        }
        if self.properties.iter().any(|p| p.name == property.name) {
            return Err(DeclarationError::DuplicateProperty {
                target: self.name.clone(),
                name: property.name.clone(),
            });
        }
        let id = PropertyId(self.properties.len());
        self.properties.push(PropertyDef {
            id,
            name: property.name.clone(),
            data_type: property.data_type,
            getter: None,
            setter: None,
        });
        inherited[property.id.0] = Some(id);
        Ok(id)
    }

    fn push_member(
        &mut self,
        name: String,
        params: Vec<Param>,
        return_type: DataType,
        kind: MemberKind,
        base: Option<NativeFn>,
    ) -> Result<MemberId, DeclarationError> {
        let id = MemberId(self.members.len());
        let mut member = MemberDef {
            id,
            name,
            params,
            return_type,
            kind,
            hash: TypeHash::EMPTY,
            base,
        };
        let param_hashes: Vec<TypeHash> = member.params.iter().map(|p| p.data_type.type_hash()).collect();
        member.hash = TypeHash::from_member(self.hash, &member.display_name(), &param_hashes);

        if self.members.iter().any(|m| m.hash == member.hash) {
            return Err(DeclarationError::DuplicateMember {
                target: self.name.clone(),
                signature: member.signature(),
            });
        }

        self.members.push(member);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn sample() -> TargetType {
        TargetType::interface("ITest")
            .method("void test()")
            .unwrap()
            .method("int add(int a, int b)")
            .unwrap()
            .method("int64 add(int64 a, int64 b)")
            .unwrap()
            .property("string Prop1 { get; set; }")
            .unwrap()
            .property("int Prop2 { get; }")
            .unwrap()
            .build()
    }

    #[test]
    fn members_in_declaration_order() {
        let target = sample();
        let names: Vec<String> = target.members().iter().map(|m| m.display_name()).collect();
        assert_eq!(names, ["test", "add", "add", "get_Prop1", "set_Prop1", "get_Prop2"]);
        for (i, member) in target.members().iter().enumerate() {
            assert_eq!(member.id, MemberId(i));
        }
    }

    #[test]
    fn methods_exclude_accessors() {
        let target = sample();
        assert_eq!(target.methods().count(), 3);
    }

    #[test]
    fn overload_lookup() {
        let target = sample();
        assert_eq!(target.overloads("add").len(), 2);
        assert!(target.overloads("missing").is_empty());

        let wide = target
            .find_method("add", &[DataType::Int64, DataType::Int64])
            .unwrap();
        assert_eq!(target.member(wide).unwrap().return_type, DataType::Int64);
        assert!(target.find_method("add", &[DataType::Int32]).is_none());
    }

    #[test]
    fn property_accessors() {
        let target = sample();
        let prop1 = target.property("Prop1").unwrap();
        assert!(!prop1.is_read_only());
        let setter = target.member(prop1.setter.unwrap()).unwrap();
        assert_eq!(setter.params, vec![Param::new("value", DataType::String)]);
        assert!(setter.is_void());
        assert_eq!(setter.signature(), "void set_Prop1(string value)");

        let prop2 = target.property("Prop2").unwrap();
        assert!(prop2.is_read_only());
        assert_eq!(
            target.member(prop2.getter.unwrap()).unwrap().return_type,
            DataType::Int32
        );
    }

    #[test]
    fn duplicate_member_rejected() {
        let err = TargetType::interface("I")
            .method("void run(int a)")
            .unwrap()
            .method("void run(int b)")
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateMember { .. }));
    }

    #[test]
    fn duplicate_property_rejected() {
        let err = TargetType::interface("I")
            .property("int P { get; }")
            .unwrap()
            .property("int P { set; }")
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateProperty { .. }));
    }

    #[test]
    fn interface_rejects_bodies() {
        let err = TargetType::interface("I")
            .virtual_method("void run()", NativeFn::new(|_: &[Value]| Ok(Value::Void)))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::BodyOnInterface { .. }));
    }

    #[test]
    fn class_members_carry_bodies() {
        let target = TargetType::class("Greeter")
            .virtual_method(
                "string greet()",
                NativeFn::new(|_: &[Value]| Ok(Value::String("hi".into()))),
            )
            .unwrap()
            .method("void abstract_member()")
            .unwrap()
            .build();

        assert!(!target.is_interface());
        assert!(target.members()[0].base().is_some());
        assert!(target.members()[1].base().is_none());
    }

    #[test]
    fn alias_types_in_declarations() {
        struct Vec3;
        let target = TargetType::interface("IPhysics")
            .with_type::<Vec3>("Vec3")
            .method("Vec3 velocity()")
            .unwrap()
            .build();
        assert!(target.members()[0]
            .return_type
            .accepts(DataType::native::<Vec3>()));
    }

    fn base() -> Arc<TargetType> {
        Arc::new(
            TargetType::interface("IBase")
                .method("void ping()")
                .unwrap()
                .property("string Label { get; set; }")
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn inherited_members_come_first() {
        let base = base();
        let derived = TargetType::interface("IDerived")
            .inherit(Arc::clone(&base))
            .unwrap()
            .method("int count()")
            .unwrap()
            .build();

        let names: Vec<String> = derived.members().iter().map(|m| m.display_name()).collect();
        assert_eq!(names, ["ping", "get_Label", "set_Label", "count"]);
        let label = derived.property("Label").unwrap();
        assert_eq!(label.getter, Some(MemberId(1)));
        assert_eq!(label.setter, Some(MemberId(2)));
        assert_eq!(derived.members()[1].kind, MemberKind::Getter(label.id));

        assert_eq!(
            derived.upcast(&base).unwrap(),
            &[MemberId(0), MemberId(1), MemberId(2)]
        );
        assert!(derived.includes(&base));
        assert!(!base.includes(&derived));
        assert!(derived.includes(&derived));
    }

    #[test]
    fn shared_ancestor_inherited_once() {
        let root = base();
        let left = Arc::new(
            TargetType::interface("ILeft")
                .inherit(Arc::clone(&root))
                .unwrap()
                .method("void left()")
                .unwrap()
                .build(),
        );
        let right = Arc::new(
            TargetType::interface("IRight")
                .inherit(Arc::clone(&root))
                .unwrap()
                .method("void right()")
                .unwrap()
                .build(),
        );

        let both = TargetType::interface("IBoth")
            .inherit(Arc::clone(&left))
            .unwrap()
            .inherit(Arc::clone(&right))
            .unwrap()
            .build();

        let names: Vec<String> = both.members().iter().map(|m| m.display_name()).collect();
        assert_eq!(names, ["ping", "get_Label", "set_Label", "left", "right"]);
        assert_eq!(both.bases().len(), 3);
        assert_eq!(
            both.upcast(&right).unwrap(),
            &[MemberId(0), MemberId(1), MemberId(2), MemberId(4)]
        );
        assert_eq!(both.upcast(&root).unwrap().len(), 3);
    }

    #[test]
    fn inherited_name_clash_rejected() {
        let err = TargetType::interface("IDerived")
            .method("void ping()")
            .unwrap()
            .inherit(base())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateMember { .. }));
    }

    #[test]
    fn interface_cannot_inherit_bodies() {
        let class = Arc::new(
            TargetType::class("Greeter")
                .virtual_method("void greet()", NativeFn::new(|_: &[Value]| Ok(Value::Void)))
                .unwrap()
                .build(),
        );
        let err = TargetType::interface("IGreeter").inherit(Arc::clone(&class)).unwrap_err();
        assert!(matches!(err, DeclarationError::BodyOnInterface { .. }));

        let derived = TargetType::class("LoudGreeter").inherit(class).unwrap().build();
        assert!(derived.members()[0].base().is_some());
    }
}
