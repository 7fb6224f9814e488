use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaProblem};
use crate::types::{TeamDetails, TeamStat};

/// Transform every raw record in order. Stops at the first bad record, so a
/// single schema failure means nothing from this fetch is written.
pub fn transform_all(raw: &[Value]) -> Result<Vec<TeamStat>, SchemaError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut stats = Vec::with_capacity(raw.len());

    for (index, record) in raw.iter().enumerate() {
        let stat = transform(index, record)?;
        if !seen.insert(stat.team_id) {
            return Err(SchemaError {
                index,
                field: "TeamID",
                problem: SchemaProblem::DuplicateTeamId(stat.team_id),
            });
        }
        stats.push(stat);
    }

    Ok(stats)
}

/// Map one provider record onto the storage schema. `index` is only used for error reporting.
pub fn transform(index: usize, raw: &Value) -> Result<TeamStat, SchemaError> {
    let Some(obj) = raw.as_object() else {
        return Err(SchemaError {
            index,
            field: "record",
            problem: SchemaProblem::NotAnObject,
        });
    };
    let rec = Record { index, obj };

    Ok(TeamStat {
        team_id: rec.required(rec.integer("TeamID"), "TeamID")?,
        team_name: rec.team_name()?,
        wins: rec.required(rec.count("Wins"), "Wins")?,
        losses: rec.required(rec.count("Losses"), "Losses")?,
        points_per_game_for: rec.required(rec.float("PointsPerGameFor"), "PointsPerGameFor")?,
        points_per_game_against: rec
            .required(rec.float("PointsPerGameAgainst"), "PointsPerGameAgainst")?,
        details: TeamDetails {
            key: rec.text("Key")?,
            conference: rec.text("Conference")?,
            division: rec.text("Division")?,
            percentage: rec.float("Percentage")?,
            home_wins: rec.count("HomeWins")?,
            home_losses: rec.count("HomeLosses")?,
            away_wins: rec.count("AwayWins")?,
            away_losses: rec.count("AwayLosses")?,
            last_ten_wins: rec.count("LastTenWins")?,
            last_ten_losses: rec.count("LastTenLosses")?,
        },
    })
}

/// Field accessors over one raw record. Each returns `Ok(None)` for an absent or
/// null field and an error for a present value of the wrong shape.
struct Record<'a> {
    index: usize,
    obj: &'a Map<String, Value>,
}

impl Record<'_> {
    fn err(&self, field: &'static str, problem: SchemaProblem) -> SchemaError {
        SchemaError {
            index: self.index,
            field,
            problem,
        }
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn required<T>(
        &self,
        value: Result<Option<T>, SchemaError>,
        field: &'static str,
    ) -> Result<T, SchemaError> {
        value?.ok_or_else(|| self.err(field, SchemaProblem::Missing))
    }

    fn integer(&self, field: &'static str) -> Result<Option<i64>, SchemaError> {
        let Some(v) = self.get(field) else {
            return Ok(None);
        };
        coerce_integer(v)
            .map(Some)
            .ok_or_else(|| self.err(field, SchemaProblem::NotAnInteger(v.to_string())))
    }

    /// Non-negative integer, e.g. wins or losses.
    fn count(&self, field: &'static str) -> Result<Option<u32>, SchemaError> {
        let Some(n) = self.integer(field)? else {
            return Ok(None);
        };
        if n < 0 {
            return Err(self.err(field, SchemaProblem::Negative(n)));
        }
        u32::try_from(n)
            .map(Some)
            .map_err(|_| self.err(field, SchemaProblem::NotAnInteger(n.to_string())))
    }

    fn float(&self, field: &'static str) -> Result<Option<f64>, SchemaError> {
        let Some(v) = self.get(field) else {
            return Ok(None);
        };
        coerce_float(v)
            .map(Some)
            .ok_or_else(|| self.err(field, SchemaProblem::NotANumber(v.to_string())))
    }

    fn text(&self, field: &'static str) -> Result<Option<String>, SchemaError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(self.err(field, SchemaProblem::NotText(other.to_string()))),
        }
    }

    /// `TeamName` when the provider sends it, otherwise "City Name" (or bare `Name`).
    fn team_name(&self) -> Result<String, SchemaError> {
        if let Some(name) = self.text("TeamName")? {
            return Ok(name);
        }
        let name = self.required(self.text("Name"), "Name")?;
        Ok(match self.text("City")? {
            Some(city) if !city.is_empty() => format!("{city} {name}"),
            _ => name,
        })
    }
}

fn coerce_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lakers() -> Value {
        json!({
            "TeamID": 1,
            "TeamName": "Lakers",
            "Wins": 25,
            "Losses": 15,
            "PointsPerGameFor": 112.5,
            "PointsPerGameAgainst": 108.3
        })
    }

    fn sportsdata_row() -> Value {
        json!({
            "TeamID": 9,
            "Key": "BOS",
            "City": "Boston",
            "Name": "Celtics",
            "Conference": "Eastern",
            "Division": "Atlantic",
            "Wins": 64,
            "Losses": 18,
            "Percentage": 0.78,
            "PointsPerGameFor": 120.6,
            "PointsPerGameAgainst": 109.2,
            "HomeWins": 37,
            "HomeLosses": 4,
            "AwayWins": 27,
            "AwayLosses": 14,
            "LastTenWins": 7,
            "LastTenLosses": 3
        })
    }

    #[test]
    fn lakers_scenario() {
        let stats = transform_all(&[lakers()]).unwrap();
        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.team_id, 1);
        assert_eq!(s.team_name, "Lakers");
        assert_eq!(s.wins, 25);
        assert_eq!(s.losses, 15);
        assert!((s.points_per_game_for - 112.5).abs() < 1e-9);
        assert!((s.points_per_game_against - 108.3).abs() < 1e-9);
        assert_eq!(s.details, TeamDetails::default());
    }

    #[test]
    fn full_standings_row_keeps_details() {
        let s = transform(0, &sportsdata_row()).unwrap();
        assert_eq!(s.team_name, "Boston Celtics");
        assert_eq!(s.details.key.as_deref(), Some("BOS"));
        assert_eq!(s.details.conference.as_deref(), Some("Eastern"));
        assert_eq!(s.details.division.as_deref(), Some("Atlantic"));
        assert_eq!(s.details.percentage, Some(0.78));
        assert_eq!(s.details.home_wins, Some(37));
        assert_eq!(s.details.away_losses, Some(14));
        assert_eq!(s.details.last_ten_losses, Some(3));
    }

    #[test]
    fn count_matches_input_when_all_valid() {
        let mut raw = vec![lakers(), sportsdata_row()];
        let mut third = lakers();
        third["TeamID"] = json!(3);
        raw.push(third);
        assert_eq!(transform_all(&raw).unwrap().len(), raw.len());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(transform_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn missing_wins_is_schema_error() {
        let mut raw = lakers();
        raw.as_object_mut().unwrap().remove("Wins");
        let err = transform_all(&[sportsdata_row(), raw]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.field, "Wins");
        assert_eq!(err.problem, SchemaProblem::Missing);
    }

    #[test]
    fn null_required_field_is_missing() {
        let mut raw = lakers();
        raw["Losses"] = Value::Null;
        let err = transform(0, &raw).unwrap_err();
        assert_eq!(err.field, "Losses");
        assert_eq!(err.problem, SchemaProblem::Missing);
    }

    #[test]
    fn non_numeric_wins_is_schema_error() {
        let mut raw = lakers();
        raw["Wins"] = json!("twenty-five");
        let err = transform(0, &raw).unwrap_err();
        assert_eq!(err.field, "Wins");
        assert!(matches!(err.problem, SchemaProblem::NotAnInteger(_)));
    }

    #[test]
    fn negative_losses_rejected() {
        let mut raw = lakers();
        raw["Losses"] = json!(-1);
        let err = transform(0, &raw).unwrap_err();
        assert_eq!(err.problem, SchemaProblem::Negative(-1));
    }

    #[test]
    fn numeric_strings_and_integral_floats_coerce() {
        let mut raw = lakers();
        raw["TeamID"] = json!("7");
        raw["Wins"] = json!(25.0);
        raw["PointsPerGameFor"] = json!("101.25");
        raw["PointsPerGameAgainst"] = json!(99);
        let s = transform(0, &raw).unwrap();
        assert_eq!(s.team_id, 7);
        assert_eq!(s.wins, 25);
        assert!((s.points_per_game_for - 101.25).abs() < 1e-9);
        assert!((s.points_per_game_against - 99.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_wins_rejected() {
        let mut raw = lakers();
        raw["Wins"] = json!(25.5);
        assert!(matches!(
            transform(0, &raw).unwrap_err().problem,
            SchemaProblem::NotAnInteger(_)
        ));
    }

    #[test]
    fn bad_optional_field_is_still_an_error() {
        let mut raw = sportsdata_row();
        raw["HomeWins"] = json!("lots");
        let err = transform(0, &raw).unwrap_err();
        assert_eq!(err.field, "HomeWins");

        let mut raw = sportsdata_row();
        raw["Conference"] = json!(1);
        assert!(matches!(
            transform(0, &raw).unwrap_err().problem,
            SchemaProblem::NotText(_)
        ));
    }

    #[test]
    fn missing_name_is_schema_error() {
        let mut raw = lakers();
        raw.as_object_mut().unwrap().remove("TeamName");
        let err = transform(0, &raw).unwrap_err();
        assert_eq!(err.field, "Name");
        assert_eq!(err.problem, SchemaProblem::Missing);
    }

    #[test]
    fn non_object_record_rejected() {
        let err = transform_all(&[json!([1, 2, 3])]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.problem, SchemaProblem::NotAnObject);
    }

    #[test]
    fn duplicate_team_id_rejected() {
        let err = transform_all(&[lakers(), sportsdata_row(), lakers()]).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.problem, SchemaProblem::DuplicateTeamId(1));
    }

    #[test]
    fn input_is_not_mutated() {
        let raw = vec![sportsdata_row()];
        let before = raw.clone();
        transform_all(&raw).unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn error_message_names_record_and_field() {
        let mut raw = lakers();
        raw.as_object_mut().unwrap().remove("Wins");
        let err = transform(4, &raw).unwrap_err();
        assert_eq!(err.to_string(), "record 4: field `Wins` is missing");
    }
}
