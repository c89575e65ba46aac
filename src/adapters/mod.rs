pub mod discord;
pub mod publisher;
pub mod stats_page;

pub use discord::DiscordPublisher;
pub use publisher::{DryRunPublisher, Publisher};
pub use stats_page::{parse_stats_page, ScrapedGame, StatsPageClient, StatsSource};
