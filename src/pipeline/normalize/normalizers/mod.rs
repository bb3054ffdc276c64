// One mapper per dataset
pub mod hatexplain;
pub mod hateval;
pub mod hh_rlhf;
pub mod real_toxicity;

pub use hatexplain::HateXplainMapper;
pub use hateval::{HatEvalLoader, HatEvalMapper};
pub use hh_rlhf::HhRlhfMapper;
pub use real_toxicity::RealToxicityMapper;
