use soilwatch_parser::ColumnDescriptor;

/// Picks the column installed closest to `requested_inches`.
///
/// Ties go to the column that appeared first in the header. Returns `None` only for an
/// empty slice, which callers rule out by identifying columns first.
pub fn select_nearest(
    columns: &[ColumnDescriptor],
    requested_inches: f64,
) -> Option<&ColumnDescriptor> {
    let mut best: Option<(&ColumnDescriptor, f64)> = None;
    for column in columns {
        let distance = (column.physical_depth - requested_inches).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((column, distance)),
        }
    }
    best.map(|(column, _)| column)
}

#[cfg(test)]
mod tests {
    use soilwatch_parser::DepthSource;

    use super::*;

    fn column(column_index: usize, physical_depth: f64) -> ColumnDescriptor {
        ColumnDescriptor {
            column_index,
            physical_depth,
            label: format!("A{column_index}"),
            channel: Some(column_index as u32),
            source: DepthSource::ChannelTable,
        }
    }

    #[test]
    fn picks_numerically_closest_depth() {
        let columns = vec![column(1, 5.9), column(2, 22.4)];
        let chosen = select_nearest(&columns, 20.0).expect("column");
        assert_eq!(chosen.column_index, 2);

        let chosen = select_nearest(&columns, 6.0).expect("column");
        assert_eq!(chosen.column_index, 1);
    }

    #[test]
    fn ties_keep_first_column() {
        let columns = vec![column(3, 4.0), column(4, 8.0)];
        let chosen = select_nearest(&columns, 6.0).expect("column");
        assert_eq!(chosen.column_index, 3);
    }

    #[test]
    fn empty_columns_select_nothing() {
        assert!(select_nearest(&[], 6.0).is_none());
    }
}
