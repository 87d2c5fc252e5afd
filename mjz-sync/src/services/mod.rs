//! Synchronization services
//!
//! Ingest walks the archive into the store, grouping assigns playlists to
//! episodes, resolution links spins to songs, and synthesis publishes one
//! catalog playlist per episode.

pub mod grouping;
pub mod ingest;
pub mod naming;
pub mod resolver;
pub mod synthesizer;
pub mod walker;

pub use grouping::{group_into_episodes, EpisodeGroup};
pub use ingest::{ingest_latest, ingest_show_pages, ingest_spins, write_batch, IngestReport};
pub use resolver::{resolve_pending, ResolveOutcome, ResolveReport, SpinResolver};
pub use synthesizer::{PlaylistSynthesizer, SynthesisOutcome, SynthesisReport};
pub use walker::{walk_playlists, with_spins, StopCondition};
