//! List commands implementation

use crate::drivers;

/// List all compiled-in drivers
pub fn list_drivers() {
    let drivers = drivers::available_drivers();

    if drivers.is_empty() {
        println!("No drivers available (recompile with driver features enabled)");
        return;
    }

    println!("Supported drivers:");
    println!();
    for d in &drivers {
        println!("  {:8} - {}", d.name, d.description);
        if !d.aliases.is_empty() {
            println!("  {:8}   aliases: {}", "", d.aliases.join(", "));
        }
    }
}
