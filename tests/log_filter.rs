use siteforge::cli::LogLevel;
use siteforge::logging::filter_directives;

#[test]
fn cli_levels_scope_verbosity_to_this_crate() {
    assert_eq!(filter_directives(LogLevel::Error), "warn,siteforge=error");
    assert_eq!(filter_directives(LogLevel::Info), "warn,siteforge=info");
    assert_eq!(filter_directives(LogLevel::Debug), "warn,siteforge=debug");
}

#[test]
fn trace_opens_up_the_whole_stack() {
    assert_eq!(filter_directives(LogLevel::Trace), "trace");
}
