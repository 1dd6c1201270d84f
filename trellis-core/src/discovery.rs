//! Link-time component discovery using inventory
//!
//! Components announce themselves with [`discover!`](crate::discover) next to
//! their definition; [`Registry::scan`](crate::Registry::scan) registers every
//! announced component without a central list.
//!
//! ```ignore
//! struct UserController;
//! impl Component for UserController { /* ... */ }
//!
//! trellis_core::discover!(UserController);
//! ```

use crate::registry::Registry;
use crate::traits::Component;
use crate::Error;

/// A component type collected via inventory.
pub struct ComponentRegistration {
    /// Full type path, used to order registrations
    pub type_name: fn() -> &'static str,
    /// Registers the type with a registry
    pub register: fn(&mut Registry) -> Result<(), Error>,
}

inventory::collect!(ComponentRegistration);

fn register_component<T: Component>(registry: &mut Registry) -> Result<(), Error> {
    registry.register::<T>().map(|_| ())
}

impl ComponentRegistration {
    pub const fn of<T: Component>() -> Self {
        Self {
            type_name: std::any::type_name::<T>,
            register: register_component::<T>,
        }
    }
}

/// Every announced component, sorted by type path so registration order
/// does not depend on link order.
pub fn discovered() -> Vec<&'static ComponentRegistration> {
    let mut registrations: Vec<_> = inventory::iter::<ComponentRegistration>
        .into_iter()
        .collect();
    registrations.sort_by_key(|r| (r.type_name)());
    registrations
}

/// Announce a component for [`Registry::scan`](crate::Registry::scan).
#[macro_export]
macro_rules! discover {
    ($component:ty) => {
        $crate::inventory::submit! {
            $crate::ComponentRegistration::of::<$component>()
        }
    };
}
