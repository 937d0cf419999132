use std::fmt::Display;
use unicode_width::UnicodeWidthStr;

/// Print a summary table with unicode box drawing characters.
///
/// Columns are sized to their widest entry, data cells are right aligned, and
/// an optional footer line runs the full width under the data.
#[derive(Default, Debug)]
pub struct TablePrinter {
    title: Option<String>,
    footer: Option<String>,
    column_names: Vec<String>,
    columns: Vec<Vec<String>>,
}

impl TablePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title<T: Display>(self, title: T) -> Self {
        Self {
            title: Some(format!("{}", title)),
            ..self
        }
    }

    pub fn with_footer<T: Display>(self, footer: T) -> Self {
        Self {
            footer: Some(format!("{}", footer)),
            ..self
        }
    }

    pub fn with_column<T, V>(mut self, col_name: T, col_vals: &[V]) -> Self
    where
        T: Display,
        V: Display,
    {
        self.column_names.push(format!("{}", col_name));
        self.columns
            .push(col_vals.iter().map(|v| format!("{}", v)).collect());
        self
    }

    pub fn print(self) {
        debug_assert!(!self.columns.is_empty(), "Must add a column.");

        let mut col_widths: Vec<usize> = self
            .column_names
            .iter()
            .zip(self.columns.iter())
            .map(|(name, vals)| {
                vals.iter()
                    .map(|v| UnicodeWidthStr::width(v.as_str()))
                    .chain(Some(UnicodeWidthStr::width(name.as_str())))
                    .max()
                    .unwrap_or(0)
                    + 2
            })
            .collect();

        // widen columns until the title and footer fit
        let boxed_width = |s: &Option<String>| {
            s.as_ref()
                .map(|s| UnicodeWidthStr::width(s.as_str()) + 2)
                .unwrap_or(0)
        };
        let min_width = boxed_width(&self.title).max(boxed_width(&self.footer));

        let mut table_width: usize = col_widths.iter().sum::<usize>() + col_widths.len() - 1;
        while table_width < min_width {
            let min = *col_widths.iter().min().unwrap();
            for width in &mut col_widths {
                if *width == min {
                    *width += 1;
                }
            }
            table_width = col_widths.iter().sum::<usize>() + col_widths.len() - 1;
        }

        // title box
        if let Some(ref title) = self.title {
            println!("\u{250c}{}\u{2510}", "\u{2500}".repeat(table_width));
            println!("\u{2502}{0:^1$}\u{2502}", title, table_width);
            print_rule(&col_widths, '\u{251c}', '\u{252c}', '\u{2524}');
        } else {
            print_rule(&col_widths, '\u{250c}', '\u{252c}', '\u{2510}');
        }

        // column names, centered
        for (name, width) in self.column_names.iter().zip(col_widths.iter()) {
            print!("\u{2502} {0:^1$} ", name, width - 2);
        }
        println!("\u{2502}");
        print_rule(&col_widths, '\u{251c}', '\u{253c}', '\u{2524}');

        // data rows, right aligned
        let num_rows = self.columns.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..num_rows {
            for (column, width) in self.columns.iter().zip(col_widths.iter()) {
                let val = column.get(i).map(String::as_str).unwrap_or("");
                print!("\u{2502} {0:>1$} ", val, width - 2);
            }
            println!("\u{2502}");
        }

        if let Some(ref footer) = self.footer {
            print_rule(&col_widths, '\u{251c}', '\u{2534}', '\u{2524}');
            println!("\u{2502}{0:<1$}\u{2502}", footer, table_width);
            println!("\u{2514}{}\u{2518}", "\u{2500}".repeat(table_width));
        } else {
            print_rule(&col_widths, '\u{2514}', '\u{2534}', '\u{2518}');
        }
    }
}

fn print_rule(col_widths: &[usize], left: char, junction: char, right: char) {
    print!("{}", left);
    for (i, &width) in col_widths.iter().enumerate() {
        if i > 0 {
            print!("{}", junction);
        }
        print!("{}", "\u{2500}".repeat(width));
    }
    println!("{}", right);
}
