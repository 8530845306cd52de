//! Notices — transient toast messages surfaced to the user.  The engine
//! pushes kind + text; the app shell renders and expires them.

use std::time::{Duration, Instant};

use egui::{Align2, Color32, Context, Id};

use crate::logger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    fn color(self) -> Color32 {
        match self {
            NoticeKind::Info => Color32::from_rgb(70, 130, 200),
            NoticeKind::Success => Color32::from_rgb(60, 160, 90),
            NoticeKind::Warning => Color32::from_rgb(210, 160, 30),
            NoticeKind::Error => Color32::from_rgb(200, 70, 70),
        }
    }

    fn log_level(self) -> &'static str {
        match self {
            NoticeKind::Info | NoticeKind::Success => "INFO",
            NoticeKind::Warning => "WARN",
            NoticeKind::Error => "ERROR",
        }
    }
}

struct Notice {
    kind: NoticeKind,
    text: String,
    created: Instant,
}

/// FIFO queue of live toasts.
#[derive(Default)]
pub struct Notices {
    queue: Vec<Notice>,
}

/// How long a toast stays on screen.
const NOTICE_TTL: Duration = Duration::from_millis(2500);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a toast and mirror it to the session log.
    pub fn push(&mut self, kind: NoticeKind, text: impl Into<String>) {
        let text = text.into();
        logger::write(kind.log_level(), &text);
        self.queue.push(Notice {
            kind,
            text,
            created: Instant::now(),
        });
    }

    /// Drop expired toasts and draw the rest stacked above the bottom edge.
    pub fn show(&mut self, ctx: &Context) {
        self.queue.retain(|n| n.created.elapsed() < NOTICE_TTL);
        if self.queue.is_empty() {
            return;
        }
        // Keep repainting while toasts are fading out
        ctx.request_repaint_after(Duration::from_millis(100));

        for (i, notice) in self.queue.iter().enumerate() {
            egui::Area::new(Id::new(("notice", i)))
                .anchor(Align2::CENTER_BOTTOM, [0.0, -16.0 - 32.0 * i as f32])
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style())
                        .fill(notice.kind.color())
                        .show(ui, |ui| {
                            ui.colored_label(Color32::WHITE, &notice.text);
                        });
                });
        }
    }
}
