//! Fallback bookkeeping
//!
//! Pure state transitions of the technology/stream chain. Side effects such as
//! starting engines and arming timers stay in the orchestrator.

use crate::config::PlaybackConfig;
use crate::types::{AttemptPhase, Technology};

#[derive(Debug, Clone)]
pub struct FallbackState {
    pub current_technology: Option<Technology>,
    pub active_stream_id: String,
    /// Position in the play order. `None` before the first attempt.
    pub technology_index: Option<usize>,
    pub backup_try_count: u32,
    pub ice_connected: bool,
    pub error_already_handled: bool,
    pub muted_retry_done: bool,
    pub muted: bool,
    /// Bumped on every attempt; results of older attempts are discarded
    pub generation: u64,
    pub phase: AttemptPhase,
}

impl FallbackState {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            current_technology: None,
            active_stream_id: config.stream_id.clone(),
            technology_index: None,
            backup_try_count: 0,
            ice_connected: false,
            error_already_handled: false,
            muted_retry_done: false,
            muted: config.mute,
            generation: 0,
            phase: AttemptPhase::Idle,
        }
    }

    /// Forget chain progress before a fresh `play()`. Mute survives.
    pub fn reset(&mut self, config: &PlaybackConfig) {
        let muted = self.muted;
        let generation = self.generation;
        *self = Self::new(config);
        self.muted = muted;
        self.generation = generation;
    }

    /// Record the start of an attempt and return its generation
    pub fn begin_attempt(
        &mut self,
        config: &PlaybackConfig,
        technology: Technology,
        stream_id: &str,
    ) -> u64 {
        self.generation += 1;
        self.current_technology = Some(technology);
        self.active_stream_id = stream_id.to_string();
        self.ice_connected = false;
        self.error_already_handled = false;
        self.muted_retry_done = false;

        let order = &config.play_order;
        let keeps_index = self
            .technology_index
            .is_some_and(|idx| order.get(idx) == Some(&technology));
        if !keeps_index {
            // a technology outside the order leaves the index unset
            self.technology_index = order.iter().position(|t| *t == technology);
        }

        self.phase = AttemptPhase::Attempting {
            technology,
            stream_id: stream_id.to_string(),
        };
        self.generation
    }

    /// The backup stream may be tried periodically instead of moving on.
    /// Only a single-technology order has nothing else to move on to.
    pub fn is_backup_stream_enabled(&self, config: &PlaybackConfig) -> bool {
        config.backup_stream_id.is_some()
            && config.play_order.len() == 1
            && self.backup_try_count < config.max_backup_try_count
    }

    /// Choose the next (technology, stream) pair and record it.
    ///
    /// While on the primary stream with a backup configured, the backup is tried
    /// on the same technology. Otherwise the chain moves to the next technology
    /// on the primary stream, wrapping at the end of the order.
    pub fn advance(&mut self, config: &PlaybackConfig) -> (Technology, String) {
        match config.backup_stream_id {
            Some(ref backup) if self.active_stream_id == config.stream_id => {
                self.active_stream_id = backup.clone();
            }
            _ => {
                self.active_stream_id = config.stream_id.clone();
                let next = match self.technology_index {
                    Some(idx) => idx + 1,
                    None => 0,
                };
                self.technology_index = Some(if next >= config.play_order.len() {
                    0
                } else {
                    next
                });
            }
        }
        self.target(config)
    }

    /// Pair the chain currently points at
    pub fn target(&self, config: &PlaybackConfig) -> (Technology, String) {
        let idx = self.technology_index.unwrap_or(0);
        let technology = config
            .play_order
            .get(idx)
            .or_else(|| config.play_order.first())
            .copied()
            .unwrap_or(Technology::WebRtc);
        (technology, self.active_stream_id.clone())
    }

    pub fn set_phase(&mut self, phase: AttemptPhase) {
        if self.phase.can_transition_to(&phase) {
            self.phase = phase;
        }
    }
}

/// How a file stream is probed and played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VodPlan {
    /// Extension passed to the prober. Empty when the id already names the file.
    pub probe_extension: String,
    /// Extension the engine plays the resource with
    pub play_extension: String,
    /// Second extension to probe when the first is missing
    pub fallback: Option<String>,
}

impl VodPlan {
    pub fn for_stream(stream_id: &str, play_types: &[String]) -> Self {
        if let Some((_, suffix)) = stream_id.rsplit_once('.') {
            return Self {
                probe_extension: String::new(),
                play_extension: suffix.to_string(),
                fallback: None,
            };
        }

        let first = play_types.first().cloned().unwrap_or_else(|| "mp4".into());
        Self {
            probe_extension: first.clone(),
            play_extension: first,
            fallback: play_types.get(1).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, PageLocation};

    fn config(query: &str) -> PlaybackConfig {
        let page = PageLocation::parse(&format!("http://example.com/app/play.html?{}", query)).unwrap();
        PlaybackConfig::resolve(ConfigSource::Location(page)).unwrap()
    }

    #[test]
    fn test_advance_wraps_around_play_order() {
        let config = config("id=s1&playOrder=webrtc,hls");
        let mut state = FallbackState::new(&config);

        state.begin_attempt(&config, Technology::WebRtc, "s1");
        assert_eq!(state.advance(&config), (Technology::Hls, "s1".to_string()));
        state.begin_attempt(&config, Technology::Hls, "s1");
        assert_eq!(state.advance(&config), (Technology::WebRtc, "s1".to_string()));
    }

    #[test]
    fn test_backup_substitution_before_next_technology() {
        let config = config("id=S&backupStreamId=T&playOrder=webrtc,hls");
        let mut state = FallbackState::new(&config);

        state.begin_attempt(&config, Technology::WebRtc, "S");
        assert_eq!(state.advance(&config), (Technology::WebRtc, "T".to_string()));
        state.begin_attempt(&config, Technology::WebRtc, "T");
        assert_eq!(state.advance(&config), (Technology::Hls, "S".to_string()));
    }

    #[test]
    fn test_technology_outside_order_wraps_to_start() {
        let config = config("id=s1&playOrder=webrtc");
        let mut state = FallbackState::new(&config);

        state.begin_attempt(&config, Technology::WebRtc, "s1");
        state.begin_attempt(&config, Technology::Hls, "s1");
        assert_eq!(state.technology_index, None);
        assert_eq!(state.advance(&config), (Technology::WebRtc, "s1".to_string()));
    }

    #[test]
    fn test_backup_eligibility() {
        let config = config("id=S&backupStreamId=T&playOrder=webrtc");
        let mut state = FallbackState::new(&config);
        assert!(state.is_backup_stream_enabled(&config));

        state.backup_try_count = config.max_backup_try_count;
        assert!(!state.is_backup_stream_enabled(&config));

        let without_backup = self::config("id=S&playOrder=webrtc");
        assert!(!FallbackState::new(&without_backup).is_backup_stream_enabled(&without_backup));
    }

    #[test]
    fn test_backup_interval_needs_single_technology() {
        let config = config("id=S&backupStreamId=T&playOrder=webrtc,hls");
        assert!(!FallbackState::new(&config).is_backup_stream_enabled(&config));

        let default_order = self::config("id=S&backupStreamId=T");
        assert_eq!(default_order.play_order.len(), 2);
        assert!(!FallbackState::new(&default_order).is_backup_stream_enabled(&default_order));
    }

    #[test]
    fn test_reset_keeps_mute_and_generation() {
        let config = config("id=s1");
        let mut state = FallbackState::new(&config);
        state.muted = true;
        state.begin_attempt(&config, Technology::WebRtc, "s1");
        state.backup_try_count = 2;

        state.reset(&config);
        assert!(state.muted);
        assert_eq!(state.generation, 1);
        assert_eq!(state.backup_try_count, 0);
        assert_eq!(state.phase, AttemptPhase::Idle);
    }

    #[test]
    fn test_vod_plan() {
        let types = vec!["mp4".to_string(), "webm".to_string()];
        assert_eq!(
            VodPlan::for_stream("clip", &types),
            VodPlan {
                probe_extension: "mp4".into(),
                play_extension: "mp4".into(),
                fallback: Some("webm".into()),
            }
        );
        assert_eq!(
            VodPlan::for_stream("clip.mov", &types),
            VodPlan {
                probe_extension: String::new(),
                play_extension: "mov".into(),
                fallback: None,
            }
        );
    }
}
