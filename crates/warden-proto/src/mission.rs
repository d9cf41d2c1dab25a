use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraAction {
    #[default]
    None,
    TakePhoto,
    StartPhotoInterval,
    StopPhotoInterval,
    StartVideo,
    StopVideo,
    StartPhotoDistance,
    StopPhotoDistance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub relative_altitude_m: f32,
    pub speed_m_s: f32,
    #[serde(default = "default_fly_through")]
    pub is_fly_through: bool,
    #[serde(default)]
    pub gimbal_pitch_deg: Option<f32>,
    #[serde(default)]
    pub gimbal_yaw_deg: Option<f32>,
    #[serde(default)]
    pub camera_action: CameraAction,
    #[serde(default)]
    pub loiter_time_s: f32,
    #[serde(default = "default_acceptance_radius")]
    pub acceptance_radius_m: f32,
    /// NaN leaves heading unconstrained.
    #[serde(default = "default_yaw")]
    pub yaw_deg: f32,
    #[serde(default)]
    pub camera_photo_interval_s: f64,
    #[serde(default)]
    pub camera_photo_distance_m: f32,
}

fn default_fly_through() -> bool { true }
fn default_acceptance_radius() -> f32 { 2.0 }
fn default_yaw() -> f32 { f32::NAN }

impl MissionItem {
    /// Plain fly-through waypoint with no camera or gimbal work.
    pub fn waypoint(latitude_deg: f64, longitude_deg: f64, relative_altitude_m: f32, speed_m_s: f32) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            relative_altitude_m,
            speed_m_s,
            is_fly_through: default_fly_through(),
            gimbal_pitch_deg: None,
            gimbal_yaw_deg: None,
            camera_action: CameraAction::None,
            loiter_time_s: 0.0,
            acceptance_radius_m: default_acceptance_radius(),
            yaw_deg: default_yaw(),
            camera_photo_interval_s: 0.0,
            camera_photo_distance_m: 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("mission plan has no items")]
    Empty,

    #[error("item {index}: coordinates out of range ({lat}, {lon})")]
    BadCoordinates { index: usize, lat: f64, lon: f64 },

    #[error("item {index}: {field} must be >= 0")]
    Negative { index: usize, field: &'static str },
}

/// Ordered waypoints for one mission. Items cannot be changed after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionPlan {
    items: Vec<MissionItem>,
}

impl MissionPlan {
    pub fn new(items: Vec<MissionItem>) -> Result<Self, PlanError> {
        if items.is_empty() {
            return Err(PlanError::Empty);
        }
        for (index, it) in items.iter().enumerate() {
            if !(it.latitude_deg.abs() <= 90.0 && it.longitude_deg.abs() <= 180.0) {
                return Err(PlanError::BadCoordinates { index, lat: it.latitude_deg, lon: it.longitude_deg });
            }
            if it.speed_m_s < 0.0 {
                return Err(PlanError::Negative { index, field: "speed_m_s" });
            }
            if it.loiter_time_s < 0.0 {
                return Err(PlanError::Negative { index, field: "loiter_time_s" });
            }
            if it.acceptance_radius_m < 0.0 {
                return Err(PlanError::Negative { index, field: "acceptance_radius_m" });
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[MissionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Closed square with its first corner at the launch point, flown
    /// clockwise: east, south-east, south, back to start.
    pub fn square(
        launch_lat: f64,
        launch_lon: f64,
        size_m: f64,
        relative_altitude_m: f32,
        speed_m_s: f32,
    ) -> Result<Self, PlanError> {
        let d = size_m * DEG_PER_METER;
        let corners = [
            (launch_lat, launch_lon),
            (launch_lat, launch_lon + d),
            (launch_lat + d, launch_lon + d),
            (launch_lat + d, launch_lon),
            (launch_lat, launch_lon),
        ];
        Self::new(
            corners
                .iter()
                .map(|&(lat, lon)| MissionItem::waypoint(lat, lon, relative_altitude_m, speed_m_s))
                .collect(),
        )
    }
}

/// Rough flat-earth conversion, good enough for survey patterns of a few
/// hundred metres.
pub const DEG_PER_METER: f64 = 1.0 / 111_000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_bad_items() {
        assert_eq!(MissionPlan::new(vec![]), Err(PlanError::Empty));

        let bad = MissionItem::waypoint(91.0, 8.5, 10.0, 3.0);
        assert!(matches!(MissionPlan::new(vec![bad]), Err(PlanError::BadCoordinates { index: 0, .. })));

        let mut slow = MissionItem::waypoint(47.39, 8.54, 10.0, 3.0);
        slow.speed_m_s = -1.0;
        let ok = MissionItem::waypoint(47.39, 8.54, 10.0, 3.0);
        assert_eq!(
            MissionPlan::new(vec![ok, slow]),
            Err(PlanError::Negative { index: 1, field: "speed_m_s" })
        );
    }

    #[test]
    fn items_fill_defaults_from_toml() {
        let it: MissionItem = toml::from_str(
            "latitude_deg = 47.3977\nlongitude_deg = 8.5456\nrelative_altitude_m = 10.0\nspeed_m_s = 3.0\n",
        )
        .unwrap();
        assert!(it.is_fly_through);
        assert_eq!(it.camera_action, CameraAction::None);
        assert_eq!(it.acceptance_radius_m, 2.0);
        assert!(it.yaw_deg.is_nan());
        assert_eq!(it.gimbal_pitch_deg, None);

        let plan = MissionPlan::new(vec![it]).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn square_returns_to_launch_corner() {
        let plan = MissionPlan::square(47.0, 8.0, 111.0, 10.0, 3.0).unwrap();
        let items = plan.items();
        assert_eq!(plan.len(), 5);
        assert_eq!((items[0].latitude_deg, items[0].longitude_deg), (47.0, 8.0));
        assert_eq!((items[4].latitude_deg, items[4].longitude_deg), (47.0, 8.0));
        assert!((items[2].latitude_deg - 47.001).abs() < 1e-9);
        assert!((items[1].longitude_deg - 8.001).abs() < 1e-9);
        assert!(items.iter().all(|i| i.relative_altitude_m == 10.0 && i.is_fly_through));
    }
}
