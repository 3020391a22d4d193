//! State shared between a worker thread and its handle.
//!
//! Requests go through a single-slot mailbox: each field holds only the most
//! recent value, so anything the worker has not picked up yet is overwritten.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

/// Externally visible lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerPhase {
    Created = 0,
    Handshaking = 1,
    Ready = 2,
    Searching = 3,
    Suspended = 4,
    Terminated = 5,
}

impl WorkerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Handshaking,
            2 => Self::Ready,
            3 => Self::Searching,
            4 => Self::Suspended,
            _ => Self::Terminated,
        }
    }
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Searching => "searching",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Suspend,
    Resume,
}

#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    pub position: Option<String>,
    pub multipv: Option<u32>,
    pub control: Option<Control>,
}

impl Mailbox {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.multipv.is_none() && self.control.is_none()
    }
}

#[derive(Debug)]
pub(crate) struct WorkerShared {
    mailbox: Mutex<Mailbox>,
    phase: AtomicU8,
    shutdown: AtomicBool,
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self {
            mailbox: Mutex::new(Mailbox::default()),
            phase: AtomicU8::new(WorkerPhase::Created as u8),
            shutdown: AtomicBool::new(false),
        }
    }
}

impl WorkerShared {
    #[cfg(test)]
    pub fn post_position(&self, fen: &str) {
        self.with_mailbox(|mail| mail.position = Some(fen.to_string()));
    }

    pub fn post_multipv(&self, multipv: u32) {
        self.with_mailbox(|mail| mail.multipv = Some(multipv));
    }

    pub fn post_control(&self, control: Control) {
        self.with_mailbox(|mail| mail.control = Some(control));
    }

    /// Resume at `fen`, posted as one update.
    pub fn post_resume(&self, fen: &str) {
        self.with_mailbox(|mail| {
            mail.position = Some(fen.to_string());
            mail.control = Some(Control::Resume);
        });
    }

    /// Empty the mailbox and return what was in it.
    pub fn take(&self) -> Mailbox {
        self.with_mailbox(std::mem::take)
    }

    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn with_mailbox<R>(&self, f: impl FnOnce(&mut Mailbox) -> R) -> R {
        let mut mail = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut mail)
    }
}
