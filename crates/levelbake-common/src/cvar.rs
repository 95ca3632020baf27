// cvar.rs — named build variables (config files and +set arguments)

use crate::common::{com_dprintf, com_printf, com_warnf};

use std::collections::HashMap;

pub const CVAR_ARCHIVE: i32 = 1; // written by write_variables
pub const CVAR_NOSET: i32 = 8; // only force_set may change it

/// A build variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

impl Cvar {
    fn new(name: &str, value: &str, flags: i32) -> Self {
        Self {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: parse_value(value),
        }
    }

    /// Replace the text and numeric value. False when nothing changed.
    fn assign(&mut self, value: &str) -> bool {
        if self.string == value {
            return false;
        }
        self.string = value.to_string();
        self.value = parse_value(value);
        self.modified = true;
        true
    }
}

fn parse_value(text: &str) -> f32 {
    text.trim().parse().unwrap_or(0.0)
}

/// All variables for one build. Owned by the caller, never global.
#[derive(Default)]
pub struct CvarContext {
    pub vars: Vec<Cvar>,
    by_name: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<&Cvar> {
        self.by_name.get(name).map(|&i| &self.vars[i])
    }

    /// Numeric value, 0 when unset.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find(name).map_or(0.0, |v| v.value)
    }

    /// Text value, empty when unset.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find(name).map_or("", |v| v.string.as_str())
    }

    /// Get or create a cvar. An existing one keeps its value and gains
    /// `flags`.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        match self.by_name.get(name) {
            Some(&i) => {
                self.vars[i].flags |= flags;
                i
            }
            None => {
                self.vars.push(Cvar::new(name, value, flags));
                self.by_name.insert(name.to_string(), self.vars.len() - 1);
                self.vars.len() - 1
            }
        }
    }

    /// Register a default and return the current value in one call.
    pub fn value_or_default(&mut self, name: &str, default: &str) -> f32 {
        let i = self.get(name, default, 0);
        self.vars[i].value
    }

    fn store(&mut self, name: &str, value: &str, force: bool) -> usize {
        let Some(&i) = self.by_name.get(name) else {
            return self.get(name, value, 0);
        };
        let var = &mut self.vars[i];
        if !force && var.flags & CVAR_NOSET != 0 {
            com_printf(&format!("{} is write protected.\n", name));
        } else if var.assign(value) {
            com_dprintf(&format!("{} = \"{}\"\n", name, value));
        }
        i
    }

    /// Set a cvar, honoring CVAR_NOSET.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.store(name, value, false)
    }

    /// Set a cvar even when it is CVAR_NOSET.
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.store(name, value, true)
    }

    /// Set from a number; whole numbers are stored without a fraction.
    pub fn set_value(&mut self, name: &str, value: f32) {
        let text = if value.fract() == 0.0 && value.abs() < i32::MAX as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &text);
    }

    /// Execute config text: one `set name value` (or `seta`) per line.
    /// `//` comments and blank lines are skipped. Returns the number of
    /// variables applied.
    pub fn exec_text(&mut self, text: &str) -> usize {
        let mut applied = 0;
        for raw in text.lines() {
            let line = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let tokens = tokenize(line);
            if tokens.is_empty() {
                continue;
            }
            match (tokens[0].as_str(), tokens.len()) {
                ("set", 3) => {
                    self.set(&tokens[1], &tokens[2]);
                    applied += 1;
                }
                ("seta", 3) => {
                    let idx = self.set(&tokens[1], &tokens[2]);
                    self.vars[idx].flags |= CVAR_ARCHIVE;
                    applied += 1;
                }
                ("set" | "seta", _) => com_printf("usage: set <variable> <value>\n"),
                (cmd, _) => com_warnf(&format!("unknown command \"{}\"\n", cmd)),
            }
        }
        applied
    }

    /// Apply `+set name value` command-line arguments. Other arguments are
    /// returned untouched, in order.
    pub fn exec_args(&mut self, args: &[String]) -> Vec<String> {
        let mut rest = Vec::new();
        let mut i = 0;
        while i < args.len() {
            if args[i] == "+set" && i + 2 < args.len() {
                com_dprintf(&format!("+set {} {}\n", args[i + 1], args[i + 2]));
                self.set(&args[i + 1], &args[i + 2]);
                i += 3;
            } else {
                rest.push(args[i].clone());
                i += 1;
            }
        }
        rest
    }

    /// Write all archived cvars to a writer.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    /// List cvars whose name starts with `prefix` (all when None).
    pub fn list(&self, prefix: Option<&str>) -> (usize, usize) {
        let prefix = prefix.unwrap_or("");
        let mut total = 0;
        let mut matching = 0;

        for var in &self.vars {
            total += 1;
            if var.name.starts_with(prefix) {
                matching += 1;
                let archive = if var.flags & CVAR_ARCHIVE != 0 { '*' } else { ' ' };
                let noset = if var.flags & CVAR_NOSET != 0 { '-' } else { ' ' };
                com_printf(&format!(
                    "{}{} {} \"{}\"\n",
                    archive, noset, var.name, var.string
                ));
            }
        }

        com_printf(&format!("{} cvars, {} matching\n", total, matching));
        (total, matching)
    }
}

/// Split a line on whitespace, honoring double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&c) = chars.peek() else { break };
        let mut tok = String::new();
        if c == '"' {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                tok.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                tok.push(c);
                chars.next();
            }
        }
        tokens.push(tok);
    }
    tokens
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("paths_maxdist", "1000", 0);
        assert_eq!(ctx.variable_value("paths_maxdist"), 1000.0);
        assert_eq!(ctx.variable_string("paths_maxdist"), "1000");
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        ctx.get("test", "1", 0);
        ctx.get("test", "2", 0);
        assert_eq!(ctx.variable_string("test"), "1");
        assert_eq!(ctx.value_or_default("test", "5"), 1.0);
        assert_eq!(ctx.value_or_default("fresh", "5"), 5.0);
    }

    #[test]
    fn test_cvar_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_NOSET);
        ctx.set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 10.0);
        ctx.force_set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_set_value() {
        let mut ctx = CvarContext::new();
        ctx.set_value("paths_optimization", 2.0);
        assert_eq!(ctx.variable_string("paths_optimization"), "2");
        ctx.set_value("scale", 0.5);
        assert_eq!(ctx.variable_string("scale"), "0.5");
    }

    #[test]
    fn test_exec_text() {
        let mut ctx = CvarContext::new();
        let text = "// bake settings\nset zone_vis_byzone 1\nseta paths_maxdist \"750\"\n\nbogus 1\nset lonely\n";
        let applied = ctx.exec_text(text);
        assert_eq!(applied, 2);
        assert_eq!(ctx.variable_value("zone_vis_byzone"), 1.0);
        assert_eq!(ctx.variable_value("paths_maxdist"), 750.0);

        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("set paths_maxdist \"750\""));
        assert!(!output.contains("zone_vis_byzone"));
    }

    #[test]
    fn test_exec_args() {
        let mut ctx = CvarContext::new();
        let args: Vec<String> = ["twin", "+set", "developer", "1", "extra", "+set"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rest = ctx.exec_args(&args);
        assert_eq!(ctx.variable_value("developer"), 1.0);
        assert_eq!(rest, vec!["twin", "extra", "+set"]);
    }

    #[test]
    fn test_list_counts_prefix() {
        let mut ctx = CvarContext::new();
        ctx.get("zone_build_vis", "1", 0);
        ctx.get("zone_build_bounds", "1", 0);
        ctx.get("paths_adjust", "1", 0);
        crate::common::com_begin_redirect();
        assert_eq!(ctx.list(Some("zone_")), (3, 2));
        let out = crate::common::com_end_redirect().unwrap();
        assert!(out.contains("3 cvars, 2 matching"));
    }
}
