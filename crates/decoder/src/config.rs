/// Beam-search decoding options loaded from TOML.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DecodeConfig {
    /// Maximum hypotheses retained per sentence after each step.
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    /// Steps below which the stop symbol's probability is floored,
    /// preventing completion. 0 allows completion at the first step.
    #[serde(default)]
    pub min_length: usize,

    /// Hard length budget: the loop runs at most `max_length - 2` steps.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Length-penalty exponent. 0 disables the length penalty.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Coverage-penalty weight. 0 disables the coverage penalty.
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Overattending-penalty weight. 0 disables the overattending penalty.
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Length-penalty smoothing constant.
    #[serde(default = "default_len_smooth")]
    pub len_smooth: f64,

    /// Margin scaling the best completed normalized score when pruning
    /// active hypotheses. See the `prune` module docs for the scale caveat.
    #[serde(default = "default_speed_prune")]
    pub speed_prune: f64,

    /// Enable the keep-filter. The beam-width truncation always applies
    /// regardless of this flag.
    #[serde(default = "default_prune")]
    pub prune: bool,

    /// Symbol every hypothesis starts from; never recorded in history.
    #[serde(default = "default_start_symbol")]
    pub start_symbol: u32,

    /// Symbol that completes a hypothesis.
    #[serde(default)]
    pub stop_symbol: u32,
}

fn default_beam_size() -> usize {
    8
}
fn default_max_length() -> usize {
    100
}
fn default_alpha() -> f64 {
    0.01
}
fn default_beta() -> f64 {
    0.4
}
fn default_gamma() -> f64 {
    1.0
}
fn default_len_smooth() -> f64 {
    5.0
}
fn default_speed_prune() -> f64 {
    1.0
}
fn default_prune() -> bool {
    true
}
fn default_start_symbol() -> u32 {
    1
}

impl DecodeConfig {
    /// Log warnings for settings that make the decoder degenerate.
    pub fn validate(&self) {
        if self.beam_size == 0 {
            tracing::warn!("beam_size is 0; every beam will be truncated to nothing");
        }
        if self.max_length < 3 {
            tracing::warn!(
                max_length = self.max_length,
                "max_length leaves no step budget; decoding returns the initial hypotheses"
            );
        }
        if self.alpha < 0.0 || self.beta < 0.0 || self.gamma < 0.0 {
            tracing::warn!(
                alpha = self.alpha,
                beta = self.beta,
                gamma = self.gamma,
                "negative penalty weights disable their penalties"
            );
        }
        if self.speed_prune < 0.0 {
            tracing::warn!(
                speed_prune = self.speed_prune,
                "negative speed_prune inverts the active-hypothesis margin"
            );
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            beam_size: default_beam_size(),
            min_length: 0,
            max_length: default_max_length(),
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            len_smooth: default_len_smooth(),
            speed_prune: default_speed_prune(),
            prune: default_prune(),
            start_symbol: default_start_symbol(),
            stop_symbol: 0,
        }
    }
}
