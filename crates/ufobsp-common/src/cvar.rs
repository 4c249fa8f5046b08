// cvar.rs — named configuration variables
//
// Every tunable of the renderer and the viewer is a cvar: registered with a
// default by the subsystem that reads it, overridable from the command line
// with `+set name value`.

use crate::common::com_printf;
use crate::q_shared::{CVAR_ARCHIVE, CVAR_LATCH, CVAR_NOSET};

use std::collections::HashMap;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub default_string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub value: f32,
}

/// The full cvar table.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a cvar by name, returning its index.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.find_var_index(name).map(|i| &self.cvar_vars[i])
    }

    /// Value of a cvar as a float, 0 if it does not exist.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// Value of a cvar as a string, empty if it does not exist.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    /// Get or create a cvar. If it already exists the value is not changed
    /// but flags are OR'd in; a variable created earlier by `set` picks up
    /// its default here.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            let var = &mut self.cvar_vars[idx];
            var.flags |= flags;
            var.default_string = value.to_string();
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            default_string: value.to_string(),
            latched_string: None,
            flags,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, 0),
        };
        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags & CVAR_NOSET != 0 {
                com_printf(&format!("{} is write protected.\n", name));
                return idx;
            }

            if var.flags & CVAR_LATCH != 0 {
                let pending = var.latched_string.as_deref().unwrap_or(var.string.as_str());
                if value != pending {
                    com_printf(&format!("{} will be changed for the next map.\n", name));
                    var.latched_string = Some(value.to_string());
                }
                return idx;
            }
        } else {
            var.latched_string = None;
        }

        if value == var.string {
            return idx; // not changed
        }

        var.string = value.to_string();
        var.value = parse_value(value);
        idx
    }

    /// Set a cvar value (respects NOSET and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores NOSET and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Apply all latched variable changes. Called when a new map starts.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.value = parse_value(&latched);
                var.string = latched;
            }
        }
    }

    /// Apply `+set name value` pairs from a command line. Returns the
    /// arguments that were not consumed, in order.
    pub fn set_from_args<I, S>(&mut self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rest = Vec::new();
        let mut it = args.into_iter().map(Into::into);
        while let Some(arg) = it.next() {
            if arg == "+set" {
                match (it.next(), it.next()) {
                    (Some(name), Some(value)) => {
                        self.force_set(&name, &value);
                    }
                    _ => com_printf("usage: +set <variable> <value>\n"),
                }
            } else {
                rest.push(arg);
            }
        }
        rest
    }

    /// Write all archived cvars to a writer.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    /// List cvars whose name starts with `prefix` (a trailing `*` is ignored).
    pub fn list(&self, prefix: Option<&str>) -> (usize, usize) {
        let prefix = prefix.unwrap_or("").trim_end_matches('*');
        let mut matching = 0;

        for var in self.cvar_vars.iter().filter(|v| v.name.starts_with(prefix)) {
            matching += 1;
            let archive = if var.flags & CVAR_ARCHIVE != 0 { '*' } else { ' ' };
            let noset = if var.flags & CVAR_NOSET != 0 {
                '-'
            } else if var.flags & CVAR_LATCH != 0 {
                'L'
            } else {
                ' '
            };
            com_printf(&format!("{}{} {} \"{}\"\n", archive, noset, var.name, var.string));
        }

        com_printf(&format!("{} cvars, {} matching\n", self.cvar_vars.len(), matching));
        (self.cvar_vars.len(), matching)
    }
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
        ctx.get("test_var", "42", 0);
        assert_eq!(ctx.variable_value("test_var"), 42.0);
        assert_eq!(ctx.variable_string("test_var"), "42");
    }

    #[test]
    fn test_cvar_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", 0);
        ctx.set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_NOSET);
        ctx.set("test_var", "20"); // should be blocked
        assert_eq!(ctx.variable_value("test_var"), 10.0);
    }

    #[test]
    fn test_cvar_force_set() {
        let mut ctx = CvarContext::new();
        ctx.get("test_var", "10", CVAR_NOSET);
        ctx.force_set("test_var", "20");
        assert_eq!(ctx.variable_value("test_var"), 20.0);
    }

    #[test]
    fn test_cvar_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert_eq!(ctx.variable_string("nonexistent"), "");
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        ctx.get("test", "1", 0);
        ctx.get("test", "2", 0); // should NOT change value
        assert_eq!(ctx.variable_string("test"), "1");
    }

    #[test]
    fn test_cvar_latch_applies_on_next_map() {
        let mut ctx = CvarContext::new();
        ctx.get("gl_lightmap_size", "256", CVAR_LATCH);
        ctx.set("gl_lightmap_size", "512");
        assert_eq!(ctx.variable_value("gl_lightmap_size"), 256.0);
        ctx.get_latched_vars();
        assert_eq!(ctx.variable_value("gl_lightmap_size"), 512.0);
        assert!(ctx.find_var("gl_lightmap_size").unwrap().latched_string.is_none());
    }

    #[test]
    fn test_set_from_args_before_registration() {
        let mut ctx = CvarContext::new();
        let rest = ctx.set_from_args(["+set", "gl_dynamic", "0", "map1", "+set", "r_nocull"]);
        assert_eq!(rest, vec!["map1".to_string()]);
        // registration keeps the command line value
        ctx.get("gl_dynamic", "1", CVAR_ARCHIVE);
        assert_eq!(ctx.variable_value("gl_dynamic"), 0.0);
        assert_eq!(ctx.find_var("gl_dynamic").unwrap().default_string, "1");
    }

    #[test]
    fn test_write_variables_only_archived() {
        let mut ctx = CvarContext::new();
        ctx.get("a", "1", CVAR_ARCHIVE);
        ctx.get("b", "2", 0);
        let mut out = Vec::new();
        ctx.write_variables(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "set a \"1\"\n");
    }

    #[test]
    fn test_list_prefix() {
        let mut ctx = CvarContext::new();
        ctx.get("gl_dynamic", "1", 0);
        ctx.get("gl_modulate", "1", 0);
        ctx.get("r_nocull", "0", 0);
        assert_eq!(ctx.list(Some("gl_*")), (3, 2));
        assert_eq!(ctx.list(None), (3, 3));
    }
}
