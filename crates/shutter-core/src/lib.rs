pub mod config;
pub mod panel;
pub mod press;
pub mod shutter;
pub mod sim_loop;
pub mod sync;
pub mod tags;
pub mod timebase;

pub use config::{SimConfig, MAX_SHUTTERS, SHUTTER_COUNT, SPEED_PER_TICK};
pub use panel::{ControlPanel, SlotControls};
pub use press::{Direction, PressTracker};
pub use shutter::{ProgressListener, Shutter, ShutterStatus};
pub use sim_loop::{ExecutionStats, SimulationLoop};
pub use sync::{BankExchange, BankSnapshot};
pub use timebase::TimeBase;
