//! Handler capability tables.
//!
//! # Responsibilities
//! - Walk a handler spec's declaration levels (concrete class first, then its
//!   ancestors) and elect at most one method per lifecycle role
//! - Reject duplicate role claims that are not structural overrides
//! - Drop a role entirely when the concrete level overrides an inherited
//!   role method without re-declaring the role (explicit unmarking wins)
//! - Build the per-parameter binding plan against the fixed resolver chain
//!
//! # Design Decisions
//! - Descriptors are built once at registration and immutable afterwards
//! - Handler instances are type-erased; invoke bodies downcast back to the
//!   concrete type declared at spec construction

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::param::{Args, ParamSpec, SigType};
use super::resolver::{default_resolvers, ArgumentResolver, BindError, RawEvent};
use super::role::Role;
use super::RegistrationError;
use crate::dispatch::Connection;

/// Type-erased live handler instance, one per admitted connection.
pub type HandlerInstance = Box<dyn Any + Send>;

/// Error escaping a handler method body.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

type InvokeFn = Arc<dyn Fn(&mut dyn Any, &Args) -> HandlerResult + Send + Sync>;
type FactoryFn = Arc<dyn Fn() -> HandlerInstance + Send + Sync>;

/// Declaration of one handler method.
pub struct MethodDecl {
    name: String,
    role: Option<Role>,
    public: bool,
    params: Vec<ParamSpec>,
    invoke: Option<InvokeFn>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            public: true,
            params: Vec::new(),
            invoke: None,
        }
    }

    /// Mark this method as implementing a lifecycle role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Declare the method as not publicly invocable. Registration rejects
    /// role-carrying methods marked this way.
    pub fn non_public(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Attach the invoke body. `H` must be the concrete type the enclosing
    /// spec's factory produces; a mismatch surfaces as a dispatch error.
    pub fn handler<H, F>(mut self, body: F) -> Self
    where
        H: 'static,
        F: Fn(&mut H, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        self.invoke = Some(Arc::new(move |instance, args| {
            match instance.downcast_mut::<H>() {
                Some(handler) => body(handler, args),
                None => Err("handler instance type does not match method declaration".into()),
            }
        }));
        self
    }

    fn sig(&self) -> MethodSig {
        MethodSig {
            name: self.name.clone(),
            params: self.params.iter().map(ParamSpec::sig_type).collect(),
        }
    }
}

/// Structural method identity: name plus parameter types. Return types are
/// uniformly `()` in this model, so they never differentiate signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MethodSig {
    name: String,
    params: Vec<SigType>,
}

/// One level of a handler declaration chain.
pub struct HandlerLevel {
    name: String,
    methods: Vec<MethodDecl>,
}

impl HandlerLevel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new() }
    }

    pub fn method(mut self, decl: MethodDecl) -> Self {
        self.methods.push(decl);
        self
    }
}

/// Explicit capability declaration for one endpoint handler type.
///
/// The first level models the concrete type; `base` appends ancestor levels
/// nearest-first, mirroring an inheritance chain walked bottom-up.
pub struct HandlerSpec {
    type_name: String,
    factory: FactoryFn,
    levels: Vec<HandlerLevel>,
}

impl HandlerSpec {
    pub fn new<H, F>(type_name: impl Into<String>, factory: F) -> Self
    where
        H: Send + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        Self {
            levels: vec![HandlerLevel::new(type_name.clone())],
            type_name,
            factory: Arc::new(move || Box::new(factory()) as HandlerInstance),
        }
    }

    /// Declare a method on the concrete level.
    pub fn method(mut self, decl: MethodDecl) -> Self {
        if let Some(concrete) = self.levels.first_mut() {
            concrete.methods.push(decl);
        }
        self
    }

    /// Append an ancestor level (nearest ancestor first).
    pub fn base(mut self, level: HandlerLevel) -> Self {
        self.levels.push(level);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// One elected method with its frozen argument-binding plan.
pub struct MethodBinding {
    name: String,
    role: Role,
    params: Vec<ParamSpec>,
    resolvers: Vec<&'static dyn ArgumentResolver>,
    invoke: InvokeFn,
}

impl MethodBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether any slot of this binding is fed by the path-param resolver.
    /// Drives the choice between exact and templated path matching.
    pub(crate) fn binds_path_param(&self) -> bool {
        self.resolvers.iter().any(|r| r.name() == "path-param")
    }

    pub(crate) fn resolve_args(
        &self,
        conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<Args, BindError> {
        let mut values = Vec::with_capacity(self.params.len());
        for (param, resolver) in self.params.iter().zip(&self.resolvers) {
            values.push(resolver.resolve(param, conn, event)?);
        }
        Ok(Args(values))
    }

    pub(crate) fn invoke(&self, instance: &mut dyn Any, args: &Args) -> HandlerResult {
        (self.invoke)(instance, args)
    }

    fn build(decl: &MethodDecl, role: Role) -> Result<Self, RegistrationError> {
        let invoke = decl
            .invoke
            .clone()
            .ok_or_else(|| RegistrationError::MissingInvoke(decl.name.clone()))?;

        let mut resolvers = Vec::with_capacity(decl.params.len());
        for (index, param) in decl.params.iter().enumerate() {
            let resolver = default_resolvers()
                .iter()
                .copied()
                .find(|r| r.supports(param, role))
                .ok_or_else(|| RegistrationError::UnresolvableParameter {
                    method: decl.name.clone(),
                    index,
                })?;
            resolvers.push(resolver);
        }

        Ok(Self {
            name: decl.name.clone(),
            role,
            params: decl.params.clone(),
            resolvers,
            invoke,
        })
    }
}

/// Immutable role→method table for one endpoint type.
pub struct HandlerDescriptor {
    type_name: String,
    factory: FactoryFn,
    bindings: HashMap<Role, MethodBinding>,
}

impl HandlerDescriptor {
    /// Build the capability table for a spec. Pure and deterministic; runs
    /// once per endpoint type at registration, never per connection.
    pub fn build(spec: &HandlerSpec) -> Result<Self, RegistrationError> {
        struct Candidate<'a> {
            decl: &'a MethodDecl,
            level: usize,
        }

        let mut elected: HashMap<Role, Candidate<'_>> = HashMap::new();

        // Walk concrete level first, then ancestors nearest-first.
        for (level_idx, level) in spec.levels.iter().enumerate() {
            for decl in &level.methods {
                let Some(role) = decl.role else { continue };
                if !decl.public {
                    return Err(RegistrationError::NonPublicMethod(decl.name.clone()));
                }
                match elected.get(&role) {
                    None => {
                        elected.insert(role, Candidate { decl, level: level_idx });
                    }
                    Some(existing) => {
                        // A second claim is legal only when it comes from an
                        // ancestor and the already-elected (more derived)
                        // method structurally overrides it.
                        if level_idx == 0 || existing.decl.sig() != decl.sig() {
                            return Err(RegistrationError::DuplicateRole {
                                role,
                                existing: existing.decl.name.clone(),
                                duplicate: decl.name.clone(),
                            });
                        }
                    }
                }
            }
        }

        // A method elected from an ancestor level is dropped when the concrete
        // level declares the same signature without that role marker.
        let concrete = spec.levels.first();
        elected.retain(|role, candidate| {
            if candidate.level == 0 {
                return true;
            }
            let Some(concrete) = concrete else { return true };
            let sig = candidate.decl.sig();
            !concrete
                .methods
                .iter()
                .any(|m| m.sig() == sig && m.role != Some(*role))
        });

        let mut bindings = HashMap::new();
        for (role, candidate) in elected {
            bindings.insert(role, MethodBinding::build(candidate.decl, role)?);
        }

        Ok(Self {
            type_name: spec.type_name.clone(),
            factory: Arc::clone(&spec.factory),
            bindings,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.bindings.contains_key(&role)
    }

    pub(crate) fn binding(&self, role: Role) -> Option<&MethodBinding> {
        self.bindings.get(&role)
    }

    pub(crate) fn instantiate(&self) -> HandlerInstance {
        (self.factory)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Greeter {
        opened: bool,
    }

    fn open_method(name: &str) -> MethodDecl {
        MethodDecl::new(name)
            .role(Role::OnOpen)
            .param(ParamSpec::session())
            .handler::<Greeter, _>(|h, _args| {
                h.opened = true;
                Ok(())
            })
    }

    #[test]
    fn role_on_concrete_level_is_elected() {
        let spec = HandlerSpec::new("Greeter", Greeter::default).method(open_method("on_open"));
        let descriptor = HandlerDescriptor::build(&spec).unwrap();
        assert!(descriptor.has_role(Role::OnOpen));
        assert!(!descriptor.has_role(Role::OnClose));
    }

    #[test]
    fn duplicate_role_on_same_level_is_rejected() {
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(open_method("on_open"))
            .method(open_method("on_open_again"));
        match HandlerDescriptor::build(&spec) {
            Err(RegistrationError::DuplicateRole { role, .. }) => assert_eq!(role, Role::OnOpen),
            other => panic!("expected duplicate role error, got {:?}", other.err()),
        }
    }

    #[test]
    fn duplicate_role_across_levels_is_rejected_when_not_an_override() {
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(open_method("on_open"))
            .base(
                HandlerLevel::new("Base").method(
                    MethodDecl::new("base_open")
                        .role(Role::OnOpen)
                        .handler::<Greeter, _>(|_, _| Ok(())),
                ),
            );
        assert!(matches!(
            HandlerDescriptor::build(&spec),
            Err(RegistrationError::DuplicateRole { .. })
        ));
    }

    #[test]
    fn re_marked_override_elects_the_concrete_method() {
        // Base and concrete both mark the same signature: the concrete one
        // (walked first) wins and the ancestor claim is tolerated.
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(open_method("on_open"))
            .base(HandlerLevel::new("Base").method(open_method("on_open")));
        let descriptor = HandlerDescriptor::build(&spec).unwrap();
        assert!(descriptor.has_role(Role::OnOpen));
    }

    #[test]
    fn unmarked_override_drops_the_role() {
        // The concrete level re-declares the inherited signature without the
        // role marker, which removes the behavior entirely.
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(
                MethodDecl::new("on_open")
                    .param(ParamSpec::session())
                    .handler::<Greeter, _>(|_, _| Ok(())),
            )
            .base(HandlerLevel::new("Base").method(open_method("on_open")));
        let descriptor = HandlerDescriptor::build(&spec).unwrap();
        assert!(!descriptor.has_role(Role::OnOpen));
    }

    #[test]
    fn unrelated_concrete_method_keeps_the_inherited_role() {
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(
                MethodDecl::new("other")
                    .param(ParamSpec::text())
                    .handler::<Greeter, _>(|_, _| Ok(())),
            )
            .base(HandlerLevel::new("Base").method(open_method("on_open")));
        let descriptor = HandlerDescriptor::build(&spec).unwrap();
        assert!(descriptor.has_role(Role::OnOpen));
    }

    #[test]
    fn non_public_role_method_is_rejected() {
        let spec = HandlerSpec::new("Greeter", Greeter::default).method(
            MethodDecl::new("hidden")
                .role(Role::OnOpen)
                .non_public()
                .handler::<Greeter, _>(|_, _| Ok(())),
        );
        assert!(matches!(
            HandlerDescriptor::build(&spec),
            Err(RegistrationError::NonPublicMethod(name)) if name == "hidden"
        ));
    }

    #[test]
    fn unresolvable_parameter_is_rejected() {
        // A text payload parameter on a close method matches no resolver.
        let spec = HandlerSpec::new("Greeter", Greeter::default).method(
            MethodDecl::new("on_close")
                .role(Role::OnClose)
                .param(ParamSpec::text())
                .handler::<Greeter, _>(|_, _| Ok(())),
        );
        assert!(matches!(
            HandlerDescriptor::build(&spec),
            Err(RegistrationError::UnresolvableParameter { index: 0, .. })
        ));
    }

    #[test]
    fn role_method_without_body_is_rejected() {
        let spec = HandlerSpec::new("Greeter", Greeter::default)
            .method(MethodDecl::new("on_open").role(Role::OnOpen));
        assert!(matches!(
            HandlerDescriptor::build(&spec),
            Err(RegistrationError::MissingInvoke(_))
        ));
    }
}
