use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::broker::Core;

pub type SharedCore = Arc<Mutex<Core>>;
