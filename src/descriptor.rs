//! Declarations of the views an application serves.
//!
//! A view is either a free function ([`FunctionView`]) or a class ([`ClassView`]): a type
//! resolved from the injector whose methods ([`MethodView`]) handle requests. Each of them carries
//! its route marker, its injected dependencies and its decorators.

use std::future::Future;
use std::marker::PhantomData;

use axum::response::IntoResponse;
use dime_core::{Binder, Injectable, Key, Scope};

use crate::decorator::Deferred;
use crate::inject::Inject;
use crate::kwargs::Kwargs;
use crate::route::RouteMarker;
use crate::view::Handler;

/// What the builder needs to know about one handler.
#[derive(Clone, Debug)]
pub(crate) struct Declaration {
    pub(crate) name: String,
    pub(crate) handler: Handler,
    pub(crate) marker: Option<RouteMarker>,
    pub(crate) inject: Inject,
    pub(crate) decorators: Vec<Deferred>,
}

impl Declaration {
    fn new(name: String, handler: Handler) -> Self {
        Self {
            name,
            handler,
            marker: None,
            inject: Inject::new(),
            decorators: Vec::new(),
        }
    }
}

/// A free function view.
///
/// ```
/// use dime_web::descriptor::FunctionView;
/// use dime_web::route::route;
/// use dime_web::Kwargs;
///
/// let bar = FunctionView::new("bar", |_: Kwargs| async { "bar" }).route(route("/bar"));
/// assert_eq!(bar.name(), "bar");
/// ```
#[derive(Clone, Debug)]
pub struct FunctionView(pub(crate) Declaration);

impl FunctionView {
    /// Creates a view named `name`. Unless the route says otherwise, the name is also the
    /// endpoint.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        Self(Declaration::new(name.into(), Handler::function(f)))
    }

    /// Sets the route, replacing any earlier one.
    #[must_use]
    pub fn route(mut self, marker: RouteMarker) -> Self {
        self.0.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn inject(mut self, inject: Inject) -> Self {
        self.0.inject = inject;
        self
    }

    /// Adds a decorator. Decorators are applied in the order they are added.
    #[must_use]
    pub fn decorate(mut self, decorator: Deferred) -> Self {
        self.0.decorators.push(decorator);
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

/// A handler method of the class `C`.
///
/// The receiver is resolved from the injector for every request, before the declared
/// dependencies.
#[derive(Debug)]
pub struct MethodView<C> {
    pub(crate) declaration: Declaration,
    _owner: PhantomData<fn() -> C>,
}

impl<C> MethodView<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(C, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        Self {
            declaration: Declaration::new(name.into(), Handler::method(f)),
            _owner: PhantomData,
        }
    }

    /// Sets the route, relative to the prefix of the class.
    #[must_use]
    pub fn route(mut self, marker: RouteMarker) -> Self {
        self.declaration.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn inject(mut self, inject: Inject) -> Self {
        self.declaration.inject = inject;
        self
    }

    #[must_use]
    pub fn decorate(mut self, decorator: Deferred) -> Self {
        self.declaration.decorators.push(decorator);
        self
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }
}

impl<C> Clone for MethodView<C> {
    fn clone(&self) -> Self {
        Self {
            declaration: self.declaration.clone(),
            _owner: PhantomData,
        }
    }
}

/// A class view: the type `C` and its handler methods.
///
/// The class-level route only takes the path prefix as positional argument; its options are the
/// defaults of every method. If no module binds `C`, the builder binds it through its
/// [`Injectable`] implementation, with a new instance for every request.
#[derive(Debug)]
pub struct ClassView<C> {
    name: String,
    marker: Option<RouteMarker>,
    methods: Vec<MethodView<C>>,
}

impl<C> ClassView<C>
where
    C: Injectable,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marker: None,
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn route(mut self, marker: RouteMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodView<C>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A [`ClassView`] with its type erased.
#[derive(Clone, Debug)]
pub struct ClassDeclaration {
    pub(crate) name: String,
    pub(crate) owner: Key,
    pub(crate) bind_owner: fn(&mut Binder),
    pub(crate) marker: Option<RouteMarker>,
    pub(crate) methods: Vec<Declaration>,
}

fn bind_owner<C>(binder: &mut Binder)
where
    C: Injectable,
{
    binder.bind_injectable::<C>(Scope::NoScope);
}

/// Any view the [`Builder`](crate::builder::Builder) accepts.
#[derive(Clone, Debug)]
pub enum View {
    Function(FunctionView),
    Class(ClassDeclaration),
}

impl View {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(view) => view.name(),
            Self::Class(class) => &class.name,
        }
    }
}

impl From<FunctionView> for View {
    fn from(view: FunctionView) -> Self {
        Self::Function(view)
    }
}

impl<C> From<ClassView<C>> for View
where
    C: Injectable,
{
    fn from(class: ClassView<C>) -> Self {
        Self::Class(ClassDeclaration {
            name: class.name,
            owner: Key::of::<C>(),
            bind_owner: bind_owner::<C>,
            marker: class.marker,
            methods: class
                .methods
                .into_iter()
                .map(|method| method.declaration)
                .collect(),
        })
    }
}
