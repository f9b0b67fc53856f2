pub mod comment_repo;
pub use comment_repo::{CommentRepository, CommentStore};
pub mod lead_repo;
pub use lead_repo::{LeadRepository, LeadStore};
pub mod referral_repo;
pub use referral_repo::{ReferralRepository, ReferralStore};
pub mod user_repo;
pub use user_repo::{UserRepository, UserStore};
