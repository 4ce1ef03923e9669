//! Output files handed to downstream collaborators.
//!
//! # Submodules
//!
//! - [`json`]: the ranked briefing with diagnostics, for the service layer
//! - [`articles`]: one plain-text file per top article, for script generation
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     └── morning.json
//!
//! articles_dir/
//! ├── article_1_Navy escorts tankers through strait.txt
//! └── article_2_Opec cuts output.txt
//! ```

pub mod articles;
pub mod json;
