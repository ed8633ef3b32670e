// src/normalize/mod.rs
pub mod convert;
pub mod date_parser;
pub mod numeric;
pub mod report;
pub mod spec;
pub mod table;
pub mod utils;
pub mod value;

use tracing::{debug, info, instrument, trace, warn};

use crate::error::SchemaError;
use crate::load::RawTable;
use convert::Coercer;
pub use report::{ColumnReport, CoercionReport, FailureSample};
pub use spec::{ColumnDef, ColumnSpec, DateGranularity, FailurePolicy, NumericLocale, SemanticType};
pub use table::{CleanTable, ColumnMeta, RowView};
pub use value::Value;

/// A declared column bound to the raw column that feeds it.
struct ColumnPlan<'a> {
    def: &'a ColumnDef,
    raw_index: usize,
    coercer: Coercer,
    policy: FailurePolicy,
}

/// Rename, coerce and filter `raw` according to `spec`.
///
/// - Every declared column is matched by canonical name, then aliases, after
///   [`utils::normalize_name`] on both sides. A missing required column is a
///   [`SchemaError`]; a missing optional one is left out and reported.
/// - Each cell is coerced; failures take the column's default or mark the row.
/// - Marked rows are removed only after all columns of that row are tallied.
///
/// Pure: the same inputs give the same table and report.
#[instrument(level = "info", skip_all, fields(rows = raw.len(), columns = spec.columns.len()))]
pub fn normalize(
    raw: &RawTable,
    spec: &ColumnSpec,
) -> Result<(CleanTable, CoercionReport), SchemaError> {
    // 1) validate the declaration and bind columns
    spec.validate()?;
    let mut report = CoercionReport {
        rows_in: raw.len(),
        ..CoercionReport::default()
    };
    let plans = resolve_columns(raw, spec, &mut report.missing_columns)?;

    let mut table = CleanTable::new(
        plans
            .iter()
            .map(|p| ColumnMeta {
                name: p.def.name.clone(),
                ty: p.def.ty,
            })
            .collect(),
    );
    let mut tallies: Vec<ColumnReport> = vec![ColumnReport::default(); plans.len()];

    // 2) coerce every cell of every row, then decide the row's fate
    for (row_idx, row) in raw.rows().iter().enumerate() {
        let mut values = Vec::with_capacity(plans.len());
        let mut drop_row = false;

        for (plan, tally) in plans.iter().zip(tallies.iter_mut()) {
            let cell = row[plan.raw_index].as_deref();
            tally.rows_attempted += 1;

            let coerced = match plan.coercer.coerce(cell) {
                Some(Value::Null) if plan.def.required => None,
                other => other,
            };
            match coerced {
                Some(v) => {
                    tally.rows_succeeded += 1;
                    values.push(v);
                }
                None => {
                    trace!(row = row_idx, column = %plan.def.name, raw = ?cell, "coercion failed");
                    tally.record_failure(row_idx, cell);
                    match &plan.policy {
                        FailurePolicy::Default(v) => {
                            tally.rows_defaulted += 1;
                            values.push(v.clone());
                        }
                        FailurePolicy::DropRow => {
                            tally.rows_dropped += 1;
                            drop_row = true;
                            values.push(Value::Null);
                        }
                    }
                }
            }
        }

        if !drop_row {
            table.push(row_idx, values);
        }
    }

    // 3) report
    report.rows_out = table.len();
    for (plan, tally) in plans.iter().zip(tallies) {
        if tally.failures() > 0 {
            info!(
                column = %plan.def.name,
                defaulted = tally.rows_defaulted,
                dropped = tally.rows_dropped,
                "coercion failures"
            );
        }
        report.columns.insert(plan.def.name.clone(), tally);
    }
    info!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        "normalized"
    );

    Ok((table, report))
}

/// Bind each declared column to the first unclaimed raw header matching its
/// canonical name or one of its aliases, tried in declaration order.
fn resolve_columns<'a>(
    raw: &RawTable,
    spec: &'a ColumnSpec,
    missing: &mut Vec<String>,
) -> Result<Vec<ColumnPlan<'a>>, SchemaError> {
    let folded: Vec<String> = raw.headers().iter().map(|h| utils::normalize_name(h)).collect();
    let mut claimed = vec![false; folded.len()];
    let mut plans = Vec::with_capacity(spec.columns.len());

    for def in &spec.columns {
        let hit = def.candidate_names().find_map(|cand| {
            let want = utils::normalize_name(cand);
            folded
                .iter()
                .enumerate()
                .find(|(i, f)| !claimed[*i] && **f == want)
                .map(|(i, _)| i)
        });

        let Some(raw_index) = hit else {
            if def.required {
                return Err(SchemaError::MissingColumn {
                    column: def.name.clone(),
                    tried: def.candidate_names().map(str::to_string).collect(),
                });
            }
            warn!(column = %def.name, "optional column not found; omitted");
            missing.push(def.name.clone());
            continue;
        };

        claimed[raw_index] = true;
        debug!(column = %def.name, raw = %raw.headers()[raw_index], "column resolved");
        let granularity = spec.granularity_for(def);
        plans.push(ColumnPlan {
            def,
            raw_index,
            coercer: Coercer {
                ty: def.ty,
                locale: spec.locale_for(def),
                granularity,
            },
            policy: def.effective_policy(granularity)?,
        });
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    fn hourly_spec() -> ColumnSpec {
        ColumnSpec::new(vec![
            ColumnDef::new("horario", SemanticType::HourOfDay)
                .alias("hora")
                .required(),
            ColumnDef::new("trecho", SemanticType::Categorical),
            ColumnDef::new("sentido", SemanticType::Categorical)
                .required()
                .default_value("Não informado"),
        ])
    }

    #[test]
    fn columns_resolve_through_aliases_and_folding() {
        let t = raw(
            &[" Hora ", "Trecho", "SENTIDO"],
            &[&["23:47", "BR-116", "Norte"]],
        );
        let (clean, report) = normalize(&t, &hourly_spec()).unwrap();
        assert_eq!(
            clean.column_names().collect::<Vec<_>>(),
            ["horario", "trecho", "sentido"]
        );
        assert_eq!(clean.get(0, "horario"), Some(&Value::Int(23)));
        assert_eq!(clean.get(0, "sentido"), Some(&Value::Str("Norte".into())));
        assert!(report.missing_columns.is_empty());
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let t = raw(&["horario", "trecho"], &[&["10:00", "BR-116"]]);
        let err = normalize(&t, &hourly_spec()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                column: "sentido".into(),
                tried: vec!["sentido".into()],
            }
        );
    }

    #[test]
    fn missing_optional_column_is_omitted_and_reported() {
        let t = raw(&["horario", "sentido"], &[&["10:00", "Sul"]]);
        let (clean, report) = normalize(&t, &hourly_spec()).unwrap();
        assert_eq!(clean.column_type("trecho"), None);
        assert_eq!(report.missing_columns, ["trecho"]);
        assert!(report.summary_lines()[0].contains("trecho"));
    }

    #[test]
    fn drop_row_failures_are_tallied_per_column() {
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("km", SemanticType::FloatLocale).required().drop_row(),
            ColumnDef::new("data", SemanticType::Date).required().drop_row(),
            ColumnDef::new("mortos", SemanticType::Integer).default_value(0i64),
        ]);
        let t = raw(
            &["km", "data", "mortos"],
            &[
                &["12,5", "05/03/2021", "1"],
                &["n/d", "31/02/2021", "x"],
                &["3", "06/03/2021", ""],
            ],
        );

        let (clean, report) = normalize(&t, &spec).unwrap();
        assert_eq!(clean.len(), 2);
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_out, 2);
        assert_eq!(report.rows_removed(), 1);

        let km = report.column("km").unwrap();
        assert_eq!((km.rows_attempted, km.rows_succeeded, km.rows_dropped), (3, 2, 1));
        // the same row failed `data` as well; it is still counted there
        let data = report.column("data").unwrap();
        assert_eq!((data.rows_attempted, data.rows_succeeded, data.rows_dropped), (3, 2, 1));
        // ...and `mortos` on that row was evaluated and defaulted
        let mortos = report.column("mortos").unwrap();
        assert_eq!(
            (mortos.rows_attempted, mortos.rows_succeeded, mortos.rows_defaulted),
            (3, 2, 1)
        );
        assert_eq!(
            mortos.samples,
            vec![FailureSample {
                row: 1,
                raw: Some("x".into())
            }]
        );

        // the empty optional count was a null success
        assert_eq!(clean.get(1, "mortos"), Some(&Value::Null));
        assert_eq!(clean.row(1).unwrap().source_row(), 2);
    }

    #[test]
    fn required_blank_takes_the_default() {
        let t = raw(&["horario", "sentido"], &[&["10:00", ""], &["25:00", "Sul"]]);
        let (clean, report) = normalize(&t, &hourly_spec()).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(
            clean.get(0, "sentido"),
            Some(&Value::Str("Não informado".into()))
        );
        assert_eq!(report.column("sentido").unwrap().rows_defaulted, 1);
        assert_eq!(report.column("horario").unwrap().rows_dropped, 1);
    }

    #[test]
    fn per_row_invariant_holds() {
        let t = raw(
            &["horario", "sentido", "trecho"],
            &[&["10:00", "Norte", "a"], &["xx", "", "b"], &["", "Sul", ""]],
        );
        let (clean, report) = normalize(&t, &hourly_spec()).unwrap();
        assert!(clean.len() <= t.len());
        for col in report.columns.values() {
            assert_eq!(
                col.rows_attempted,
                col.rows_succeeded + col.rows_defaulted + col.rows_dropped
            );
        }
    }

    #[test]
    fn raw_columns_are_not_claimed_twice() {
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("tipo_acidente", SemanticType::Categorical).alias("tipo"),
            ColumnDef::new("tipo_ocorrencia", SemanticType::Categorical).alias("tipo"),
        ]);
        let t = raw(&["tipo"], &[&["Colisão"]]);
        let (clean, report) = normalize(&t, &spec).unwrap();
        assert_eq!(clean.column_names().collect::<Vec<_>>(), ["tipo_acidente"]);
        assert_eq!(report.missing_columns, ["tipo_ocorrencia"]);
    }

    #[test]
    fn normalization_is_deterministic() {
        let t = raw(
            &["horario", "sentido", "trecho"],
            &[&["10:00", "Norte", "a"], &["bad", "Sul", "b"]],
        );
        let spec = hourly_spec();
        let first = normalize(&t, &spec).unwrap();
        let second = normalize(&t, &spec).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn column_granularity_overrides_the_spec_default() {
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("data", SemanticType::Date)
                .with_granularity(DateGranularity::Day),
            ColumnDef::new("registro", SemanticType::Date),
        ])
        .with_granularity(DateGranularity::Minute);
        let t = raw(
            &["data", "registro"],
            &[&["05/03/2021 23:47:31", "05/03/2021 23:47:31"]],
        );
        let (clean, _) = normalize(&t, &spec).unwrap();
        assert_eq!(clean.get(0, "data").unwrap().canonical_text(), "2021-03-05");
        assert_eq!(
            clean.get(0, "registro").unwrap().canonical_text(),
            "2021-03-05T23:47:00"
        );
    }

    #[test]
    fn invalid_spec_is_rejected_before_any_row() {
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("mortos", SemanticType::Integer).default_value("nenhum")
        ]);
        let t = raw(&["mortos"], &[&["1"]]);
        assert!(matches!(
            normalize(&t, &spec),
            Err(SchemaError::InvalidDefault { .. })
        ));
    }
}
