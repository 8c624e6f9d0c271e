//! Flow Control
//!
//! A two-mode governor that picks the send rate from recent RTT with
//! hysteresis. Good conditions earn the fast rate; an RTT spike drops to
//! the slow rate and charges a penalty: the connection must hold good RTT
//! for `penalty_time` seconds before being promoted again. Flapping
//! doubles the penalty (up to a minute); sustained good behaviour halves
//! it (down to a second).

/// RTT above this many milliseconds counts as bad conditions.
const RTT_THRESHOLD_MS: f64 = 250.0;

/// Send rate in good mode, packets per second.
const GOOD_SEND_RATE: f64 = 30.0;

/// Send rate in bad mode, packets per second.
const BAD_SEND_RATE: f64 = 10.0;

/// Penalty charged on construction and reset, seconds.
const INITIAL_PENALTY: f64 = 4.0;

const MIN_PENALTY: f64 = 1.0;
const MAX_PENALTY: f64 = 60.0;

/// A good streak shorter than this before a drop doubles the penalty.
const FLAP_WINDOW: f64 = 10.0;

/// Seconds of good mode that earn one penalty halving.
const PENALTY_REDUCTION_INTERVAL: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowMode {
    Good,
    Bad,
}

/// Adaptive send-rate governor driven once per tick with `(dt, rtt_ms)`.
#[derive(Debug)]
pub struct FlowControl {
    mode: FlowMode,
    penalty_time: f64,
    good_conditions_time: f64,
    penalty_reduction_accumulator: f64,
}

impl FlowControl {
    /// Start in bad mode with the initial penalty charged.
    pub fn new() -> Self {
        FlowControl {
            mode: FlowMode::Bad,
            penalty_time: INITIAL_PENALTY,
            good_conditions_time: 0.0,
            penalty_reduction_accumulator: 0.0,
        }
    }

    /// Return to the initial state (bad mode, initial penalty).
    pub fn reset(&mut self) {
        *self = FlowControl::new();
    }

    /// Feed one tick of `dt` seconds with the current smoothed RTT in
    /// milliseconds.
    pub fn update(&mut self, dt: f64, rtt_ms: f64) {
        if self.mode == FlowMode::Good {
            if rtt_ms > RTT_THRESHOLD_MS {
                tracing::info!(rtt_ms, "dropping to bad mode");
                self.mode = FlowMode::Bad;
                if self.good_conditions_time < FLAP_WINDOW && self.penalty_time < MAX_PENALTY {
                    self.penalty_time = (self.penalty_time * 2.0).min(MAX_PENALTY);
                    tracing::debug!(penalty_time = self.penalty_time, "penalty time increased");
                }
                self.good_conditions_time = 0.0;
                self.penalty_reduction_accumulator = 0.0;
                return;
            }

            self.good_conditions_time += dt;
            self.penalty_reduction_accumulator += dt;

            if self.penalty_reduction_accumulator > PENALTY_REDUCTION_INTERVAL
                && self.penalty_time > MIN_PENALTY
            {
                self.penalty_time = (self.penalty_time / 2.0).max(MIN_PENALTY);
                tracing::debug!(penalty_time = self.penalty_time, "penalty time reduced");
                self.penalty_reduction_accumulator = 0.0;
            }
            return;
        }

        // Bad mode: earn promotion by holding good RTT for penalty_time.
        if rtt_ms <= RTT_THRESHOLD_MS {
            self.good_conditions_time += dt;
        } else {
            self.good_conditions_time = 0.0;
        }

        if self.good_conditions_time > self.penalty_time {
            tracing::info!("upgrading to good mode");
            self.good_conditions_time = 0.0;
            self.penalty_reduction_accumulator = 0.0;
            self.mode = FlowMode::Good;
        }
    }

    /// The send rate the application should pace to, packets per second.
    pub fn send_rate(&self) -> f64 {
        match self.mode {
            FlowMode::Good => GOOD_SEND_RATE,
            FlowMode::Bad => BAD_SEND_RATE,
        }
    }

    /// Whether the governor currently allows the fast rate.
    pub fn is_good(&self) -> bool {
        self.mode == FlowMode::Good
    }

    /// Seconds of good RTT currently required for promotion.
    pub fn penalty_time(&self) -> f64 {
        self.penalty_time
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 30.0;

    fn run(flow: &mut FlowControl, seconds: f64, rtt_ms: f64) {
        let mut elapsed = 0.0;
        while elapsed < seconds {
            flow.update(DT, rtt_ms);
            elapsed += DT;
        }
    }

    #[test]
    fn test_starts_bad_with_initial_penalty() {
        let flow = FlowControl::new();
        assert!(!flow.is_good());
        assert_eq!(flow.send_rate(), BAD_SEND_RATE);
        assert_eq!(flow.penalty_time(), INITIAL_PENALTY);
    }

    #[test]
    fn test_promotion_after_penalty_served() {
        let mut flow = FlowControl::new();
        run(&mut flow, 3.9, 50.0);
        assert!(!flow.is_good());
        run(&mut flow, 0.2, 50.0);
        assert!(flow.is_good());
        assert_eq!(flow.send_rate(), GOOD_SEND_RATE);
    }

    #[test]
    fn test_bad_rtt_resets_good_streak() {
        let mut flow = FlowControl::new();
        run(&mut flow, 3.0, 50.0);
        flow.update(DT, 400.0); // streak gone
        run(&mut flow, 3.9, 50.0);
        assert!(!flow.is_good());
    }

    #[test]
    fn test_flap_doubles_penalty() {
        let mut flow = FlowControl::new();
        run(&mut flow, 4.1, 50.0);
        assert!(flow.is_good());

        // Dropping within the flap window doubles the penalty.
        flow.update(DT, 400.0);
        assert!(!flow.is_good());
        assert_eq!(flow.penalty_time(), 8.0);
    }

    #[test]
    fn test_long_good_streak_avoids_doubling() {
        let mut flow = FlowControl::new();
        run(&mut flow, 4.1, 50.0);
        assert!(flow.is_good());

        // Hold good for over the flap window; penalty halves meanwhile.
        run(&mut flow, 10.5, 50.0);
        assert_eq!(flow.penalty_time(), 2.0);

        flow.update(DT, 400.0);
        assert!(!flow.is_good());
        assert_eq!(flow.penalty_time(), 2.0);
    }

    #[test]
    fn test_penalty_capped_at_max() {
        let mut flow = FlowControl::new();
        for _ in 0..10 {
            // Serve the penalty, then immediately flap.
            while !flow.is_good() {
                flow.update(DT, 50.0);
            }
            flow.update(DT, 400.0);
        }
        assert_eq!(flow.penalty_time(), MAX_PENALTY);
    }

    #[test]
    fn test_penalty_floor_at_min() {
        let mut flow = FlowControl::new();
        run(&mut flow, 4.1, 50.0);
        assert!(flow.is_good());

        run(&mut flow, 60.0, 50.0);
        assert_eq!(flow.penalty_time(), MIN_PENALTY);
    }

    #[test]
    fn test_escalation_scenario() {
        let mut flow = FlowControl::new();

        // 5 s of 50 ms RTT serves the initial 4 s penalty.
        run(&mut flow, 5.0, 50.0);
        assert!(flow.is_good());

        // One 400 ms sample: bad mode, penalty doubled (streak < 10 s).
        flow.update(DT, 400.0);
        assert!(!flow.is_good());
        assert_eq!(flow.penalty_time(), 8.0);

        // 8.01 s of good RTT earns promotion with the penalty unchanged.
        run(&mut flow, 8.1, 50.0);
        assert!(flow.is_good());
        assert_eq!(flow.penalty_time(), 8.0);

        // A further 10 s of good time halves it.
        run(&mut flow, 10.1, 50.0);
        assert_eq!(flow.penalty_time(), 4.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut flow = FlowControl::new();
        run(&mut flow, 30.0, 50.0);
        flow.reset();
        assert!(!flow.is_good());
        assert_eq!(flow.penalty_time(), INITIAL_PENALTY);
    }
}
