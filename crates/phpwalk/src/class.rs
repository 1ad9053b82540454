//! Class registry & method resolution.
//!
//! Shaped for single-inheritance-plus-interfaces-plus-traits: class
//! graphs are acyclic by registration validation and addressed by
//! arena index (`ClassId`) rather than raw parent/child pointers, so
//! the ancestry graph never needs mutable reference cycles.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{MethodDecl, Param, Visibility};
use crate::control::{Control, RunResult};
use crate::errors::ExcKind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: Rc<str>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub params: Vec<Param>,
    pub body: Option<Rc<Vec<crate::ast::Stmt>>>,
    /// Fixed at registration; `self::` and
    /// `parent::` resolve against this, never the runtime class.
    pub declaring_class: ClassId,
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: Rc<str>,
    pub visibility: Visibility,
    pub is_readonly: bool,
    pub default: Option<crate::ast::Expr>,
    pub declaring_class: ClassId,
}

pub struct Class {
    pub name: Rc<str>,
    pub parent: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_interface: bool,
    pub is_trait: bool,
    /// Own + trait-composed instance properties, in declaration order
    /// (does not include inherited properties; instantiation walks
    /// the ancestor chain root-first the same way method lookup walks
    /// it leaf-first).
    pub properties: IndexMap<Rc<str>, PropertyDef>,
    /// Own + trait-composed methods, keyed by lower-cased name.
    pub methods: AHashMap<Rc<str>, Rc<MethodDef>>,
    pub consts: AHashMap<Rc<str>, Value>,
    /// Flattened transitive ancestor + interface set, for O(1)
    /// `instanceof`.
    pub ancestry: HashSet<ClassId>,
    pub static_props: RefCell<AHashMap<Rc<str>, Value>>,
}

pub struct ClassRegistry {
    classes: Vec<Class>,
    by_name: AHashMap<String, ClassId>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry { classes: Vec::new(), by_name: AHashMap::new() }
    }

    pub fn get(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registers a class from its own declaration plus already-resolved
    /// parent/interface/trait class ids. Performs every registration-time
    /// check: abstract-method completeness, final enforcement,
    /// interface completeness, and trait-conflict detection.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        name: Rc<str>,
        parent: Option<ClassId>,
        interfaces: Vec<ClassId>,
        traits: Vec<ClassId>,
        is_abstract: bool,
        is_final: bool,
        is_interface: bool,
        is_trait: bool,
        own_instance_properties: Vec<crate::ast::PropertyDecl>,
        own_static_defaults: Vec<(Rc<str>, Value)>,
        own_methods: Vec<Rc<MethodDecl>>,
        own_consts: AHashMap<Rc<str>, Value>,
    ) -> RunResult<ClassId> {
        let lower = name.to_ascii_lowercase();
        if self.by_name.contains_key(&lower) {
            return Err(Control::Exception(ExcKind::Redeclaration.throw(format!("class {name} already declared"))));
        }
        if let Some(parent_id) = parent {
            if self.get(parent_id).is_final {
                return Err(Control::Exception(
                    ExcKind::FatalError.throw(format!("cannot extend final class {}", self.get(parent_id).name)),
                ));
            }
        }

        let id = ClassId(self.classes.len());

        let mut ancestry = HashSet::new();
        ancestry.insert(id);
        if let Some(p) = parent {
            ancestry.extend(self.get(p).ancestry.iter().copied());
        }
        for iface in &interfaces {
            ancestry.extend(self.get(*iface).ancestry.iter().copied());
        }

        let mut properties: IndexMap<Rc<str>, PropertyDef> = IndexMap::new();
        if let Some(p) = parent {
            for (k, v) in &self.get(p).properties {
                properties.insert(k.clone(), v.clone());
            }
        }

        let mut methods: AHashMap<Rc<str>, Rc<MethodDef>> = AHashMap::new();
        if let Some(p) = parent {
            for (k, v) in &self.get(p).methods {
                methods.insert(k.clone(), v.clone());
            }
        }

        // Trait composition: copy in methods/props, re-bound to this
        // class as declaring class. A name contributed by more than one
        // trait (and not overridden by the using class itself) is a
        // registration-time error, never a silent pick.
        let mut trait_method_origin: AHashMap<Rc<str>, Rc<str>> = AHashMap::new();
        for trait_id in &traits {
            let t = self.get(*trait_id);
            for (mname, mdef) in &t.methods {
                if let Some(prior_trait) = trait_method_origin.get(mname) {
                    return Err(Control::Exception(ExcKind::TraitConflict.throw(format!(
                        "method {mname} is defined by both trait {prior_trait} and trait {} used in {name}",
                        t.name
                    ))));
                }
                trait_method_origin.insert(mname.clone(), t.name.clone());
                let rebound = Rc::new(MethodDef { declaring_class: id, ..(**mdef).clone() });
                methods.insert(mname.clone(), rebound);
            }
            for (pname, pdef) in &t.properties {
                properties.insert(pname.clone(), PropertyDef { declaring_class: id, ..pdef.clone() });
            }
        }

        for prop in own_instance_properties {
            properties.insert(
                prop.name.clone(),
                PropertyDef {
                    name: prop.name,
                    visibility: prop.visibility,
                    is_readonly: prop.is_readonly,
                    default: prop.default,
                    declaring_class: id,
                },
            );
        }

        for method in &own_methods {
            let def = Rc::new(MethodDef {
                name: method.name.clone(),
                visibility: method.visibility,
                is_static: method.is_static,
                is_abstract: method.is_abstract,
                is_final: method.is_final,
                params: method.params.clone(),
                body: method.body.clone(),
                declaring_class: id,
            });
            let key: Rc<str> = Rc::from(method.name.to_ascii_lowercase());
            if let Some(existing) = methods.get(&key) {
                if existing.is_final && existing.declaring_class != id {
                    return Err(Control::Exception(
                        ExcKind::FatalError.throw(format!("cannot override final method {}", method.name)),
                    ));
                }
            }
            methods.insert(key, def);
        }

        if !is_abstract && !is_interface && !is_trait {
            for m in methods.values() {
                if m.is_abstract {
                    return Err(Control::Exception(ExcKind::AbstractNotImplemented.throw(format!(
                        "class {name} does not implement abstract method {}",
                        m.name
                    ))));
                }
            }
            for iface in &interfaces {
                for (mname, _) in &self.get(*iface).methods {
                    if !methods.contains_key(mname) {
                        return Err(Control::Exception(ExcKind::FatalError.throw(format!(
                            "class {name} does not implement interface method {mname} required by {}",
                            self.get(*iface).name
                        ))));
                    }
                }
            }
        }

        let mut consts = AHashMap::new();
        if let Some(p) = parent {
            consts.extend(self.get(p).consts.clone());
        }
        consts.extend(own_consts);

        let mut static_props = AHashMap::new();
        for (name, value) in own_static_defaults {
            static_props.insert(name, value);
        }

        self.classes.push(Class {
            name: name.clone(),
            parent,
            interfaces,
            is_abstract,
            is_final,
            is_interface,
            is_trait,
            properties,
            methods,
            consts,
            ancestry,
            static_props: RefCell::new(static_props),
        });
        self.by_name.insert(lower, id);
        Ok(id)
    }

    /// `instanceof`: true iff `sub` equals `target` or transitively
    /// extends/implements it.
    pub fn is_instance_of(&self, sub: ClassId, target: ClassId) -> bool {
        self.get(sub).ancestry.contains(&target)
    }

    /// Method lookup walking the class then ancestors; the
    /// flattened `methods` map already contains inherited entries, so
    /// this is a direct lookup.
    pub fn resolve_method(&self, class: ClassId, name: &str) -> Option<Rc<MethodDef>> {
        self.get(class).methods.get(&*name.to_ascii_lowercase()).cloned()
    }

    /// Finds `name`'s declaration (own or inherited) on `class`, for
    /// visibility checks at property-access sites.
    pub fn resolve_property(&self, class: ClassId, name: &str) -> Option<PropertyDef> {
        self.get(class).properties.get(name).cloned()
    }

    /// Finds the nearest class in `class`'s ancestry (self first) that
    /// declares static property `name`, so subclasses that don't
    /// redeclare it share the declaring class's slot.
    pub fn resolve_static_prop_owner(&self, class: ClassId, name: &str) -> Option<ClassId> {
        let mut current = Some(class);
        while let Some(c) = current {
            if self.get(c).static_props.borrow().contains_key(name) {
                return Some(c);
            }
            current = self.get(c).parent;
        }
        None
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a visibility rule for accessing `member` declared on
/// `declaring_class`, from code whose own declaring class (if any) is
/// `from_class`.
pub fn check_visibility(
    registry: &ClassRegistry,
    visibility: Visibility,
    declaring_class: ClassId,
    from_class: Option<ClassId>,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => from_class == Some(declaring_class),
        Visibility::Protected => match from_class {
            Some(fc) => registry.is_instance_of(fc, declaring_class) || registry.is_instance_of(declaring_class, fc),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap as Map;

    fn empty_registry() -> ClassRegistry {
        ClassRegistry::new()
    }

    #[allow(clippy::too_many_arguments)]
    fn reg_simple(
        reg: &mut ClassRegistry,
        name: &str,
        parent: Option<ClassId>,
        is_abstract: bool,
        is_final: bool,
        methods: Vec<Rc<MethodDecl>>,
    ) -> RunResult<ClassId> {
        reg.register(Rc::from(name), parent, vec![], vec![], is_abstract, is_final, false, false, vec![], vec![], methods, Map::new())
    }

    #[test]
    fn registering_duplicate_name_fails() {
        let mut reg = empty_registry();
        reg_simple(&mut reg, "Foo", None, false, false, vec![]).unwrap();
        let err = reg_simple(&mut reg, "Foo", None, false, false, vec![]).unwrap_err();
        assert!(matches!(err, Control::Exception(_)));
    }

    #[test]
    fn extending_final_class_fails() {
        let mut reg = empty_registry();
        let base = reg_simple(&mut reg, "Base", None, false, true, vec![]).unwrap();
        let err = reg_simple(&mut reg, "Child", Some(base), false, false, vec![]).unwrap_err();
        assert!(matches!(err, Control::Exception(_)));
    }

    #[test]
    fn instance_of_is_transitive() {
        let mut reg = empty_registry();
        let a = reg_simple(&mut reg, "A", None, false, false, vec![]).unwrap();
        let b = reg_simple(&mut reg, "B", Some(a), false, false, vec![]).unwrap();
        let c = reg_simple(&mut reg, "C", Some(b), false, false, vec![]).unwrap();
        assert!(reg.is_instance_of(c, a));
        assert!(reg.is_instance_of(c, b));
        assert!(!reg.is_instance_of(a, c));
    }

    #[test]
    fn abstract_method_not_implemented_is_rejected() {
        let mut reg = empty_registry();
        let abstract_method = Rc::new(MethodDecl {
            name: Rc::from("doIt"),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: true,
            is_final: false,
            params: vec![],
            body: None,
            span: crate::ast::Span::synthetic(),
        });
        let base = reg_simple(&mut reg, "Base", None, true, false, vec![abstract_method]).unwrap();
        let err = reg_simple(&mut reg, "Child", Some(base), false, false, vec![]).unwrap_err();
        assert!(matches!(err, Control::Exception(_)));
    }
}
