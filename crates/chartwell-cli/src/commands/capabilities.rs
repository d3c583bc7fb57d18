//! Capabilities command implementation.

use crate::error::Result;
use crate::output::Formatter;
use chartwell_extractor::CapabilityRegistry;

/// Execute the capabilities command.
pub fn execute_capabilities(registry: &CapabilityRegistry, formatter: &Formatter) -> Result<()> {
    println!("{}", formatter.format_capabilities(&registry.describe())?);
    Ok(())
}
