/// Source identifiers (used in logs, metrics, and summaries)
pub const HATEXPLAIN_SOURCE: &str = "hatexplain";
pub const HATEVAL_SOURCE: &str = "hateval";
pub const HH_RLHF_SOURCE: &str = "hh_rlhf";
pub const REAL_TOXICITY_SOURCE: &str = "real_toxicity_prompts";

// Row id prefixes; the prefix alone keeps ids unique across sources
pub const HATEXPLAIN_ID_PREFIX: &str = "hx";
pub const HATEVAL_ID_PREFIX: &str = "he";
pub const HH_RLHF_ID_PREFIX: &str = "hh";
pub const REAL_TOXICITY_ID_PREFIX: &str = "rtp";

// Timestamp sequence offsets per source
pub const HATEXPLAIN_TS_OFFSET: u64 = 1000;
pub const HH_RLHF_TS_OFFSET: u64 = 2000;
pub const HATEVAL_TS_OFFSET: u64 = 3000;
pub const REAL_TOXICITY_TS_OFFSET: u64 = 4000;

// Upstream dataset names
pub const HATEXPLAIN_DATASET: &str = "Hate-speech-CNERG/hatexplain";
pub const HATEVAL_DATASET: &str = "valeriobasile/HatEval";
pub const HATEVAL_SUPERSET_DATASET: &str = "manueltonneau/spanish-hate-speech-superset";
pub const HH_RLHF_DATASET: &str = "Anthropic/hh-rlhf";
pub const HH_RLHF_SUBSET: &str = "harmless-base";
pub const REAL_TOXICITY_DATASET: &str = "allenai/real-toxicity-prompts";

// Run defaults
pub const DEFAULT_MAX_ROWS: usize = 2000;
pub const DEFAULT_BANDS_HIGH: f64 = 0.85;
pub const DEFAULT_BANDS_MEDIUM: f64 = 0.60;
pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const MAX_WINDOW_DAYS: u32 = 36_500;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_HUB_BASE_URL: &str = "https://datasets-server.huggingface.co";
pub const DEFAULT_HUB_FILE_URL: &str = "https://huggingface.co";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Output columns, in file order
pub const OUTPUT_COLUMNS: [&str; 12] = [
    "id",
    "ts",
    "policy_category",
    "confidence",
    "decision",
    "rationale",
    "slice",
    "language",
    "latencyMs",
    "costCents",
    "user_response",
    "appeal_outcome",
];

/// Get all source identifiers in emission order
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        HATEXPLAIN_SOURCE,
        HATEVAL_SOURCE,
        HH_RLHF_SOURCE,
        REAL_TOXICITY_SOURCE,
    ]
}
