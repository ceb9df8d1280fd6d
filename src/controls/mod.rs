mod brightness;
mod debounce;

pub use brightness::BrightnessController;
pub use debounce::DebouncedBrightness;

use anyhow::Result;

pub trait Tickable: Send {
    fn on_tick(&mut self) -> Result<()>;
}
