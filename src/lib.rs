//! # spire-cel-composer: expression-driven JWT-SVID credential composer
//!
//! An operator supplies one expression that rewrites the claims of a
//! workload JWT-SVID before SPIRE signs it. The expression sees
//! `trust_domain`, `spiffe_trust_domain` and the typed `request`, and yields
//! a `ComposeWorkloadJWTSVIDResponse` (or a map of the same shape).
//!
//! ## Expression Pipeline
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Parser → Macro expansion → Type Checker → Interpreter
//! ```
//!
//! ### Stage 1: Tokenization
//!
//! The [`tokenizer`] module turns source text into position-tagged tokens.
//!
//! ### Stage 2: Preprocessing
//!
//! The [`preprocessor`] module drops comments and whitespace.
//!
//! ### Stage 3: Parsing and macro expansion
//!
//! The [`analyzer`] module builds the [`ast`] with parser combinators over
//! tokens, then expands `has`, the comprehension macros and `cel.bind`.
//!
//! ### Stage 4: Type Checking
//!
//! The [`type_checker`] module checks the tree against an [`env::Environment`]
//! and resolves every call to its candidate overloads. All issues are
//! reported together.
//!
//! ### Stage 5: Evaluation
//!
//! The [`eval`] module runs the checked tree over [`value::Value`]s.
//!
//! [`program`] drives stages 1 to 4 and produces a reusable [`program::Program`].
//!
//! ## Composer
//!
//! * [`config`]: the configuration document
//! * [`store`]: the installed configuration, swapped atomically on reload
//! * [`composer`]: the credential composer service
//! * [`schema`]: native request/response types and their value adapters

pub mod analyzer;
pub mod ast;
pub mod composer;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod preprocessor;
pub mod program;
pub mod schema;
pub mod store;
pub mod tokenizer;
pub mod type_checker;
pub mod types;
pub mod value;

// Re-exports
pub use composer::{CredentialComposer, CredentialComposerService};
pub use config::{ComposerConfig, ConfigError, JwtConfig};
pub use error::*;
pub use program::{compile, compile_with_options, CompileError, Program, ProgramOptions};
pub use schema::{ComposeWorkloadJwtSvidRequest, ComposeWorkloadJwtSvidResponse, JwtSvidAttributes};
pub use store::{Configuration, ConfigurationStore};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
