//! Hands URLs and files to the system viewer

use std::any::Any;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::info;

pub trait LinkOpener: Any {
    fn open(&self, target: &str) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Opens targets with the platform's default handler
pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open(&self, target: &str) -> Result<()> {
        info!("Opening {target} in system viewer");
        open::that_detached(target).with_context(|| format!("Failed to open {target}"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records targets instead of opening them
#[derive(Default)]
pub struct MockLinkOpener {
    opened: Mutex<Vec<String>>,
}

impl MockLinkOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl LinkOpener for MockLinkOpener {
    fn open(&self, target: &str) -> Result<()> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(target.to_string());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
