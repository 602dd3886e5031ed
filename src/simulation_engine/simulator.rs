// simulator.rs
//
// Synthesizes one traffic snapshot for every road segment. Volumes follow the
// road class, the hour of day and the weekday; a small share of roads gets a
// random spike. The generator keeps no state between calls: all randomness
// comes from the caller's RNG so runs can be reproduced with a seeded one.

use crate::road_network::segments::RoadSegment;
use crate::shared_data::{round2, RoadState, TrafficSnapshot};
use chrono::{DateTime, Datelike, Local, Timelike};
use rand::Rng;

/// Chance that a road gets a traffic spike in a snapshot.
pub const SPIKE_PROBABILITY: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct TrafficSimulator {
    segments: Vec<RoadSegment>,
    simulation_speed: f64,
}

impl TrafficSimulator {
    pub fn new(segments: Vec<RoadSegment>, simulation_speed: f64) -> Self {
        Self {
            segments,
            simulation_speed,
        }
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn simulation_speed(&self) -> f64 {
        self.simulation_speed
    }

    /// Rush-hour and weekend multiplier for the given instant.
    pub fn time_multiplier(at: &DateTime<Local>) -> f64 {
        let hour = at.hour();
        let mut multiplier = match hour {
            7..=9 | 17..=19 => 2.5,
            22..=23 | 0..=6 => 0.3,
            10..=16 => 1.2,
            _ => 1.0,
        };
        if at.weekday().num_days_from_monday() >= 5 {
            multiplier *= 0.7;
        }
        multiplier
    }

    /// Generates one snapshot; every road state carries the timestamp `at`.
    pub fn simulate_snapshot<R: Rng>(&self, at: DateTime<Local>, rng: &mut R) -> TrafficSnapshot {
        let multiplier = Self::time_multiplier(&at) * self.simulation_speed;

        let roads = self
            .segments
            .iter()
            .map(|segment| {
                let class = segment.road_class;
                let base = rng.random_range(class.base_volume_range()) as f64;
                let noise = rng.random_range(0.7..1.3);
                let mut vehicle_count = (base * multiplier * noise).max(0.0) as u32;
                let mut congestion_score =
                    (vehicle_count as f64 / class.capacity() * 100.0).min(100.0);

                if rng.random::<f64>() < SPIKE_PROBABILITY {
                    congestion_score = (congestion_score * rng.random_range(1.5..2.0)).min(100.0);
                    vehicle_count = (vehicle_count as f64 * rng.random_range(1.5..2.0)) as u32;
                }

                RoadState::new(segment, vehicle_count, round2(congestion_score), at)
            })
            .collect();

        TrafficSnapshot::new(at, roads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::road_network::segments::create_road_segments;
    use chrono::TimeZone;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn simulator(speed: f64) -> TrafficSimulator {
        let segments = create_road_segments(EngineConfig::default().map_center).unwrap();
        TrafficSimulator::new(segments, speed)
    }

    // 2024-05-06 is a Monday, 2024-05-11 a Saturday.
    fn monday_at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_time_multiplier_by_hour() {
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(8)), 2.5);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(18)), 2.5);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(3)), 0.3);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(23)), 0.3);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(12)), 1.2);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(20)), 1.0);
        assert_eq!(TrafficSimulator::time_multiplier(&monday_at(21)), 1.0);
    }

    #[test]
    fn test_weekend_scales_down() {
        let saturday = Local.with_ymd_and_hms(2024, 5, 11, 8, 0, 0).unwrap();
        let factor = TrafficSimulator::time_multiplier(&saturday);
        assert!((factor - 2.5 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_generated_states_stay_in_bounds() {
        let sim = simulator(1.0);
        let mut rng = SmallRng::seed_from_u64(7);
        for hour in 0..24 {
            for _ in 0..20 {
                let snapshot = sim.simulate_snapshot(monday_at(hour), &mut rng);
                assert_eq!(snapshot.len(), sim.segments().len());
                for road in &snapshot.roads {
                    assert!((0.0..=100.0).contains(&road.congestion_score));
                    assert!(road.congestion_level.is_none());
                    assert_eq!(road.timestamp, snapshot.timestamp);
                }
            }
        }
    }

    #[test]
    fn test_high_speed_saturates_at_one_hundred() {
        let sim = simulator(50.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let snapshot = sim.simulate_snapshot(monday_at(8), &mut rng);
        assert!(snapshot.roads.iter().all(|r| r.congestion_score == 100.0));
    }

    #[test]
    fn test_zero_speed_means_empty_roads() {
        let sim = simulator(0.0);
        let mut rng = SmallRng::seed_from_u64(11);
        let snapshot = sim.simulate_snapshot(monday_at(8), &mut rng);
        assert!(snapshot.roads.iter().all(|r| r.vehicle_count == 0));
        assert!(snapshot.roads.iter().all(|r| r.congestion_score == 0.0));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let sim = simulator(1.0);
        let at = monday_at(12);
        let first = sim.simulate_snapshot(at, &mut SmallRng::seed_from_u64(42));
        let second = sim.simulate_snapshot(at, &mut SmallRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_night_volumes_are_lower_than_rush_hour() {
        let sim = simulator(1.0);
        let mut rng = SmallRng::seed_from_u64(5);
        let mut night = 0u64;
        let mut rush = 0u64;
        for _ in 0..50 {
            night += sim.simulate_snapshot(monday_at(3), &mut rng).total_vehicles();
            rush += sim.simulate_snapshot(monday_at(8), &mut rng).total_vehicles();
        }
        assert!(rush > night * 3);
    }
}
