use colored::*;

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// `" (a, b)"`, or nothing for no markers.
pub fn format_markers(markers: &[&str]) -> String {
    if markers.is_empty() {
        String::new()
    } else {
        format!(" ({})", markers.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_markers() {
        assert_eq!(format_markers(&[]), "");
        assert_eq!(format_markers(&["env"]), " (env)");
        assert_eq!(format_markers(&["local", "installed"]), " (local, installed)");
    }
}
