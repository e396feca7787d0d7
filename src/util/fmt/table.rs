use std::fmt;

use crate::{
    symbols::{Attribute, SymbolTable},
    util::fmt::{Context, Show},
};

const WIDTH: usize = 110;

fn demarcation(f: &mut fmt::Formatter<'_>, chr: char) -> fmt::Result {
    for _ in 0..WIDTH {
        write!(f, "{chr}")?;
    }
    writeln!(f)
}

/// Fixed-width listing of every entry, framed by demarcation lines.
impl Show for SymbolTable {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        demarcation(f, '=')?;
        writeln!(
            f,
            "{:<33}{:<11}{:<11}{:<17}{:<11}",
            "Name", "Kind", "Level", "Type", "Attribute"
        )?;
        demarcation(f, '-')?;

        for entry in self.entries() {
            let level = if entry.is_global() {
                format!("{}(global)", entry.level)
            } else {
                format!("{}(local)", entry.level)
            };
            let attribute = match &entry.attribute {
                Attribute::None => String::new(),
                Attribute::Constant(value) => value.to_string(),
                Attribute::Parameters(types) => types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            writeln!(
                f,
                "{:<33}{:<11}{:<11}{:<17}{:<11}",
                ctx.names.get(entry.name),
                entry.kind.name(),
                level,
                entry.ty.to_string(),
                attribute
            )?;
        }

        demarcation(f, '-')
    }
}
