//! Binding scope, dispatch routing and trace formats of API functions.
//!
//! Every dispatchable handle wraps a driver object and reaches a table of
//! driver entry points. Functions taking the root object or one of its
//! direct children go through the instance table; everything further down
//! the handle tree goes through the table of the nearest object created by
//! a top-level one (the device).

use std::fmt;

use crate::config::{FunctionOverride, GeneratorConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::logging::{debug, trace};
use crate::model::{
    Entity, EntityId, EntityKind, Function, Param, Primitive, Registry, Resolved, TypeRef,
};
use crate::select::RequiredSet;

/// Resolves instance functions and works with a null instance, so it never
/// dispatches through a table.
pub const GLOBAL_ENTRY_POINT: &str = "vkGetInstanceProcAddr";

/// Allocation callbacks are never forwarded to the driver.
pub const ALLOCATION_CALLBACKS: &str = "VkAllocationCallbacks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Resolved by the loader; no thunk and no table entry.
    Global,
    /// Dispatched through the root object's table.
    TopObject,
    /// Dispatched through the table of a lower object.
    SubObject,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::TopObject => f.write_str("instance"),
            Scope::SubObject => f.write_str("device"),
        }
    }
}

/// `printf` placeholder of a traced parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Pointer,
    Bitmask,
    Signed,
    Unsigned,
    Float,
    /// 64-bit values, formatted through `wine_dbgstr_longlong`.
    Wide,
}

impl TraceFormat {
    pub fn placeholder(self) -> &'static str {
        match self {
            TraceFormat::Pointer => "%p",
            TraceFormat::Bitmask => "%#x",
            TraceFormat::Signed => "%d",
            TraceFormat::Unsigned => "%u",
            TraceFormat::Float => "%f",
            TraceFormat::Wide => "0x%s",
        }
    }

    /// Expression passed for a parameter named `name`.
    pub fn argument(self, name: &str) -> String {
        match self {
            TraceFormat::Wide => format!("wine_dbgstr_longlong({name})"),
            _ => name.to_string(),
        }
    }
}

/// Required, dispatch-included functions of each scope, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchTables {
    pub top: Vec<EntityId>,
    pub sub: Vec<EntityId>,
}

impl DispatchTables {
    pub fn table(&self, scope: Scope) -> &[EntityId] {
        match scope {
            Scope::TopObject => &self.top,
            Scope::SubObject => &self.sub,
            Scope::Global => &[],
        }
    }
}

/// Answers routing questions about functions of a resolved registry.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::classify::{Classifier, Scope};
///
/// let classifier = Classifier::new(&registry, &config);
/// let f = registry.function(registry.lookup("vkCmdDraw")?).unwrap();
/// assert_eq!(classifier.scope(f), Scope::SubObject);
/// assert_eq!(classifier.dispatch_expr(&f.params[0]).as_deref(), Some("commandBuffer->device->funcs"));
/// ```
pub struct Classifier<'a> {
    registry: &'a Registry<Resolved>,
    config: &'a GeneratorConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(registry: &'a Registry<Resolved>, config: &'a GeneratorConfig) -> Self {
        Self { registry, config }
    }

    fn parent(&self, handle: EntityId) -> Option<EntityId> {
        self.registry.handle(handle).and_then(|h| h.parent)
    }

    /// Scope of functions whose first parameter is this handle: the root and
    /// its direct children are top objects.
    pub fn handle_scope(&self, handle: EntityId) -> Scope {
        match self.parent(handle) {
            None => Scope::TopObject,
            Some(parent) if self.parent(parent).is_none() => Scope::TopObject,
            Some(_) => Scope::SubObject,
        }
    }

    /// The dispatchable handle a function is called on, if any.
    pub fn dispatch_handle(&self, f: &Function<Resolved>) -> Option<EntityId> {
        if f.name == GLOBAL_ENTRY_POINT {
            return None;
        }
        let first = f.params.first()?;
        if first.is_pointer() || !self.registry.is_dispatchable(first.ty) {
            return None;
        }
        first.entity()
    }

    pub fn scope(&self, f: &Function<Resolved>) -> Scope {
        match self.dispatch_handle(f) {
            Some(handle) => self.handle_scope(handle),
            None => Scope::Global,
        }
    }

    /// Manual handling of a function; plain thunk and table entry by default.
    pub fn override_for(&self, name: &str) -> FunctionOverride {
        self.config.override_for(name).copied().unwrap_or_default()
    }

    pub fn emits_thunk(&self, f: &Function<Resolved>) -> bool {
        self.scope(f) != Scope::Global && self.override_for(&f.name).emit_thunk
    }

    pub fn in_dispatch_table(&self, f: &Function<Resolved>) -> bool {
        self.scope(f) != Scope::Global && self.override_for(&f.name).include_in_dispatch_table
    }

    /// Handle whose wrapper object holds the table `handle` dispatches
    /// through.
    ///
    /// Top objects use the root's table. Lower objects use the table of the
    /// nearest ancestor (or themselves) created by a top object.
    pub fn table_owner(&self, handle: EntityId) -> EntityId {
        let mut current = handle;
        for _ in 0..self.registry.len() {
            let Some(parent) = self.parent(current) else {
                return current;
            };
            if self.handle_scope(handle) == Scope::SubObject
                && self.handle_scope(parent) == Scope::TopObject
            {
                return current;
            }
            current = parent;
        }
        current
    }

    /// Expression reaching the dispatch table through parameter `p`.
    pub fn dispatch_expr(&self, p: &Param<Resolved>) -> Option<String> {
        let handle = p.entity().filter(|_| self.registry.is_dispatchable(p.ty))?;
        let owner = self.table_owner(handle);
        if owner == handle {
            Some(format!("{}->funcs", p.name))
        } else {
            Some(format!(
                "{}->{}->funcs",
                p.name,
                snake_case(self.registry.name(owner))
            ))
        }
    }

    /// Field of a dispatchable handle's wrapper holding the driver handle.
    pub fn native_payload(&self, handle: EntityId) -> String {
        let name = self.registry.name(handle);
        self.config
            .native_payloads
            .get(name)
            .cloned()
            .unwrap_or_else(|| snake_case(name))
    }

    /// Argument forwarded to the driver for `p` when the parameter needs no
    /// conversion: `NULL` for allocation callbacks, the native handle for
    /// dispatchable handles, the parameter itself otherwise.
    pub fn native_arg(&self, p: &Param<Resolved>) -> String {
        if p.type_name.contains(ALLOCATION_CALLBACKS) {
            return "NULL".to_string();
        }
        match p.entity().filter(|_| self.registry.is_dispatchable(p.ty)) {
            Some(handle) => format!("{}->{}", p.name, self.native_payload(handle)),
            None => p.name.clone(),
        }
    }

    /// Dispatch tables over every required function.
    pub fn dispatch_tables(&self, required: &RequiredSet) -> DispatchTables {
        let mut tables = DispatchTables::default();
        for id in self.registry.ids_of(EntityKind::Function) {
            if !required.contains(id) {
                continue;
            }
            let Some(f) = self.registry.function(id) else {
                continue;
            };
            if !self.in_dispatch_table(f) {
                trace!(function = %f.name, "not in a dispatch table");
                continue;
            }
            match self.scope(f) {
                Scope::TopObject => tables.top.push(id),
                Scope::SubObject => tables.sub.push(id),
                Scope::Global => {}
            }
        }
        debug!(
            instance = tables.top.len(),
            device = tables.sub.len(),
            "dispatch tables built"
        );
        tables
    }

    /// Trace placeholder for a parameter, reporting types with no format.
    pub fn trace_format(
        &self,
        f: &Function<Resolved>,
        p: &Param<Resolved>,
        diagnostics: &mut Diagnostics,
    ) -> TraceFormat {
        if p.is_pointer() || p.is_fixed_array() {
            return TraceFormat::Pointer;
        }
        let format = match p.ty {
            TypeRef::Entity(id) => match self.registry.get(id) {
                Some(Entity::Handle(h)) if h.dispatchable => Some(TraceFormat::Pointer),
                Some(Entity::Handle(_)) => Some(TraceFormat::Wide),
                Some(Entity::Alias(a)) if a.bitmask => Some(TraceFormat::Bitmask),
                Some(Entity::Enum(_)) => Some(TraceFormat::Signed),
                Some(Entity::Alias(_)) => self.registry.primitive_of(p.ty).and_then(primitive_format),
                _ => None,
            },
            TypeRef::Primitive(prim) => primitive_format(prim),
        };
        format.unwrap_or_else(|| {
            diagnostics.report(Diagnostic::UnhandledTraceType {
                function: f.name.clone(),
                param: p.name.clone(),
                type_name: p.type_name.clone(),
            });
            TraceFormat::Pointer
        })
    }
}

fn primitive_format(prim: Primitive) -> Option<TraceFormat> {
    match prim {
        Primitive::Int | Primitive::Int32 => Some(TraceFormat::Signed),
        Primitive::Uint32 => Some(TraceFormat::Unsigned),
        Primitive::Float => Some(TraceFormat::Float),
        Primitive::Int64 | Primitive::Uint64 | Primitive::SizeT => Some(TraceFormat::Wide),
        _ => None,
    }
}

/// `VkPhysicalDevice` -> `physical_device`.
pub fn snake_case(type_name: &str) -> String {
    let base = type_name.strip_prefix("Vk").unwrap_or(type_name);
    let mut out = String::with_capacity(base.len() + 4);
    for (i, c) in base.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
