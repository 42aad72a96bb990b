/*!
Command dispatch from positional arguments.

The positional count alone selects the action, so a malformed invocation is
rejected before the register window is ever mapped.
*/

use shared::BusConfig;

/// What the invocation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write the bus flags and reset the core
    Reconfigure(BusConfig),
    /// Run the acquisition loop
    Capture,
    /// Wrong argument count
    Usage,
}

impl Action {
    /// `cspol cpha cpol` with any token not matching exactly left inactive,
    /// so `-cspol` and the like clear the flag.
    pub fn from_positionals(args: &[String]) -> Self {
        match args {
            [] => Action::Capture,
            [cspol, cpha, cpol] => Action::Reconfigure(BusConfig::new(
                cspol == "cspol",
                cpha == "cpha",
                cpol == "cpol",
            )),
            _ => Action::Usage,
        }
    }
}

pub const USAGE: &str = "\
command:
Reseting component with configuration
$ spisnif (-)cspol (-)cpha (-)cpol
        cspol    active
       -cspol    inactive
        cpha     active
       -cpha     inactive
        cpol     active
       -cpol     inactive
Read frames :
$ spisnif";

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_args_runs_capture() {
        assert_eq!(Action::from_positionals(&[]), Action::Capture);
    }

    #[test]
    fn test_three_args_reconfigure() {
        assert_eq!(
            Action::from_positionals(&args(&["cspol", "-cpha", "cpol"])),
            Action::Reconfigure(BusConfig::new(true, false, true))
        );
        assert_eq!(
            Action::from_positionals(&args(&["-cspol", "-cpha", "-cpol"])),
            Action::Reconfigure(BusConfig::default())
        );
        // flags are positional, not named
        assert_eq!(
            Action::from_positionals(&args(&["cpha", "cspol", "cpol"])),
            Action::Reconfigure(BusConfig::new(false, false, true))
        );
    }

    #[test]
    fn test_other_counts_print_usage() {
        assert_eq!(Action::from_positionals(&args(&["cspol"])), Action::Usage);
        assert_eq!(Action::from_positionals(&args(&["cspol", "cpha"])), Action::Usage);
        assert_eq!(
            Action::from_positionals(&args(&["cspol", "cpha", "cpol", "x"])),
            Action::Usage
        );
    }
}
