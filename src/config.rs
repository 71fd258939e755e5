//! Version and REPL banner text.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "Hissp";
pub const WELCOME_SUBTITLE: &str = "a Lisp that compiles to a restricted expression fragment of its host";
pub const WELCOME_FOOTER: &str = "Type (quit) or Ctrl-D to exit.";

pub const HELP_TEXT: &str = r#"
Available commands:
  (quit) or (exit)     - Exit the REPL
  (clear)              - Clear the screen

Type any Lissp expression to read, expand, emit, and evaluate it.
"#;
