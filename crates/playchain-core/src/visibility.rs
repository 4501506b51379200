//! Playback surface visibility
//!
//! The container and the placeholder are always shown in opposition: while an
//! engine renders, the placeholder is hidden, and while the player is between
//! attempts the placeholder is shown instead.

use std::sync::Arc;
use tracing::debug;

/// A host element that can be shown or hidden
pub trait Surface: Send + Sync {
    fn set_visible(&self, visible: bool);
}

/// Host-side 360° renderer bound to the playback surface
pub trait SphereRenderer: Send + Sync {
    fn attach(&self);
    fn detach(&self);
}

/// Toggles container, placeholder and sphere in lockstep
pub struct VisibilityController {
    container: Arc<dyn Surface>,
    placeholder: Option<Arc<dyn Surface>>,
    sphere: Option<Arc<dyn SphereRenderer>>,
    sphere_attached: bool,
    visible: bool,
}

impl VisibilityController {
    pub fn new(container: Arc<dyn Surface>, placeholder: Option<Arc<dyn Surface>>) -> Self {
        Self {
            container,
            placeholder,
            sphere: None,
            sphere_attached: false,
            visible: false,
        }
    }

    /// Render through a 360° sphere while visible
    pub fn with_sphere(mut self, sphere: Arc<dyn SphereRenderer>) -> Self {
        self.sphere = Some(sphere);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_player_visible(&mut self, visible: bool) {
        debug!(visible, "Player visibility");
        self.visible = visible;
        self.container.set_visible(visible);
        if let Some(ref placeholder) = self.placeholder {
            placeholder.set_visible(!visible);
        }

        if let Some(ref sphere) = self.sphere {
            if visible && !self.sphere_attached {
                sphere.attach();
                self.sphere_attached = true;
            } else if !visible && self.sphere_attached {
                sphere.detach();
                self.sphere_attached = false;
            }
        }
    }
}

impl std::fmt::Debug for VisibilityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityController")
            .field("visible", &self.visible)
            .field("has_placeholder", &self.placeholder.is_some())
            .field("sphere_attached", &self.sphere_attached)
            .finish()
    }
}
