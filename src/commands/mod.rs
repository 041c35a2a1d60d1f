use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::display::renderer::Renderer;

pub mod replay;
pub mod settings;

/// Lock a renderer shared with session hooks.
fn lock_renderer<W: std::io::Write>(renderer: &Mutex<Renderer<W>>) -> MutexGuard<'_, Renderer<W>> {
    renderer.lock().unwrap_or_else(PoisonError::into_inner)
}
