mod check_config;
mod reasons;
mod transitions;

pub(crate) use check_config::cmd_check_config;
pub(crate) use reasons::cmd_reasons;
pub(crate) use transitions::cmd_transitions;
