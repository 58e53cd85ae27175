pub mod config;
pub mod encoding;
pub mod headers;
pub mod milter;
pub mod options;
pub mod policy;
pub mod scanner;
pub mod verdict;

pub use config::{AddHeadersMode, Config};
pub use encoding::to_ascii;
pub use headers::{add_headers, wants_headers_added, HeaderSet};
pub use milter::Milter;
pub use options::{get_options, ScanOptions};
pub use policy::{should_check, EmailAddress, MailContext};
pub use scanner::Scanner;
pub use verdict::{parse_response, SymbolMatch, Verdict};
