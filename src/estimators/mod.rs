//! Numeric fitting primitives used by the node parameter models.
//!
//! These are deliberately small: ordinary least squares for Gaussian nodes
//! with continuous parents, a softmax classifier for logit nodes, and an EM
//! Gaussian mixture for the mixture families, all on `ndarray` types.

pub mod gmm;
pub mod linalg;
pub mod linear;
pub mod logistic;

pub use gmm::GaussianMixture;
pub use linear::LinearRegressor;
pub use logistic::LogitClassifier;
