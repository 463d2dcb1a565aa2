// src/models/analytics.rs

// Eventos gravados em `analytics_events` (consumidos pelo dashboard).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEvent {
    ReviewRequestSent,
    ReviewReminderSent,
    ReviewReply,
    ReviewPositive,
    ReviewNegative,
    MessageReceived,
    BlastStarted,
}

impl AnalyticsEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticsEvent::ReviewRequestSent => "review_request_sent",
            AnalyticsEvent::ReviewReminderSent => "review_reminder_sent",
            AnalyticsEvent::ReviewReply => "review_reply",
            AnalyticsEvent::ReviewPositive => "review_positive",
            AnalyticsEvent::ReviewNegative => "review_negative",
            AnalyticsEvent::MessageReceived => "message_received",
            AnalyticsEvent::BlastStarted => "blast_started",
        }
    }
}
