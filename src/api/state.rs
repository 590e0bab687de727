//! Shared state passed to every API handler (§4.11, §9: "thin Axum layer"
//! in front of the scheduler/hub/store that do the actual work).

use std::sync::Arc;

use crate::executor::push::PushTracker;
use crate::hub::Hub;
use crate::scheduler::{ConfigSource, Scheduler};
use crate::store::HeartbeatStore;

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn HeartbeatStore>,
    pub hub: Hub,
    pub push_tracker: Arc<PushTracker>,
    pub config_source: Arc<dyn ConfigSource>,
}
