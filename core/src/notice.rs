//! User-visible notices.
//!
//! Transient notices can be dismissed; persistent ones stay until the
//! view is left or the operator switches runs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// First failure of a connection streak.
    Reconnecting,
    /// Reconnect attempts exhausted.
    ConnectionLost,
    /// A REST request failed.
    RequestFailed,
}

impl NoticeKind {
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::ConnectionLost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub id:      u64,
    pub kind:    NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        self.next_id += 1;
        let notice = Notice {
            id: self.next_id,
            kind,
            message: message.into(),
        };
        match kind {
            NoticeKind::ConnectionLost | NoticeKind::RequestFailed => {
                log::warn!("{}", notice.message)
            }
            NoticeKind::Reconnecting => log::info!("{}", notice.message),
        }
        self.notices.push(notice);
        self.next_id
    }

    /// Dismiss a transient notice. Persistent notices refuse.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices
            .retain(|n| n.id != id || n.kind.is_persistent());
        self.notices.len() != before
    }

    /// Drop connection notices; used when the view leaves a run.
    pub fn clear_connection_notices(&mut self) {
        self.notices
            .retain(|n| !matches!(n.kind, NoticeKind::Reconnecting | NoticeKind::ConnectionLost));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn count_of(&self, kind: NoticeKind) -> usize {
        self.notices.iter().filter(|n| n.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
