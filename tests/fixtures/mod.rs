/// Shared harness for driving a controller against a temporary store and a fake device
#[allow(dead_code)]
pub mod harness {
    use std::path::PathBuf;
    use std::sync::Arc;

    use rmad::controller::ControllerOptions;
    use rmad::hardware::fake::FakeDeviceState;
    use rmad::state::{
        ComponentRepairStatus, ComponentsRepairState, Destination, DeviceDestinationState,
        RepairStatus, RmadComponent, WelcomeChoice, WelcomeState,
    };
    use rmad::{FakeClock, FakeDevice, Hardware, HandlerContext, JsonStore, RmadController, RmadState};
    use tempfile::TempDir;

    pub const START_SECONDS: i64 = 1_700_000_000;

    pub struct Harness {
        pub dir: TempDir,
        pub device: Arc<FakeDevice>,
        pub clock: Arc<FakeClock>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_device(FakeDeviceState::default())
        }

        pub fn with_device(state: FakeDeviceState) -> Self {
            Self {
                dir: TempDir::new().expect("Failed to create temp dir"),
                device: Arc::new(FakeDevice::with_state(state)),
                clock: Arc::new(FakeClock::at_epoch_seconds(START_SECONDS)),
            }
        }

        pub fn store_path(&self) -> PathBuf {
            self.dir.path().join("rma-data").join("state")
        }

        pub fn metrics_dir(&self) -> PathBuf {
            self.dir.path().join("rma-data").join("metrics")
        }

        /// Opens the store file afresh, as a restarted daemon would
        pub fn context(&self) -> HandlerContext {
            HandlerContext {
                store: Arc::new(JsonStore::open(self.store_path())),
                clock: self.clock.clone(),
                hardware: Hardware::fake(self.device.clone()),
                working_dir: self.dir.path().to_path_buf(),
            }
        }

        pub fn options(&self) -> ControllerOptions {
            ControllerOptions {
                log_output_dir: self.dir.path().join("logs"),
                metrics_dir: self.metrics_dir(),
            }
        }

        pub fn controller(&self) -> RmadController {
            RmadController::new(self.context(), self.options()).expect("Controller should start")
        }

        pub fn advance_seconds(&self, seconds: i64) {
            self.clock.advance(chrono::Duration::seconds(seconds));
        }
    }

    pub fn welcome() -> RmadState {
        RmadState::Welcome(WelcomeState {
            choice: WelcomeChoice::FinalizeRepair,
        })
    }

    /// Reports every probed component, with `replaced` marked as replaced
    pub fn components(replaced: &[RmadComponent]) -> RmadState {
        RmadState::ComponentsRepair(ComponentsRepairState {
            components: RmadComponent::ALL
                .iter()
                .map(|component| ComponentRepairStatus {
                    component: *component,
                    repair_status: if replaced.contains(component) {
                        RepairStatus::Replaced
                    } else {
                        RepairStatus::Original
                    },
                })
                .collect(),
            mainboard_rework: false,
        })
    }

    pub fn destination(destination: Destination) -> RmadState {
        RmadState::DeviceDestination(DeviceDestinationState { destination })
    }
}
