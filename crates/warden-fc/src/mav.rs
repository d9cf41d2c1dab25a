use async_trait::async_trait;
use futures::{stream, StreamExt};
use mavlink::{
    common::{
        GpsFixType, MavAutopilot, MavCmd, MavFrame, MavMessage, MavMissionResult, MavModeFlag,
        MavResult, MavState, MavSysStatusSensor, MavType, COMMAND_LONG_DATA, HEARTBEAT_DATA,
        MISSION_COUNT_DATA, MISSION_ITEM_INT_DATA,
    },
    error::MessageReadError,
    MavConnection, MavHeader,
};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};
use warden_proto::{
    CameraAction, GpsInfo, HealthState, MissionPlan, Position, StreamKind, TelemetrySample,
};

use crate::error::{TelemetryError, VehicleError};
use crate::state::LinkStatus;
use crate::vehicle::{SampleSource, Vehicle};
use crate::VehicleConfig;

type Conn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

const SAMPLE_BUFFER: usize = 256;
const REPLY_BUFFER: usize = 64;
/// GPS_RAW_INT reports unknown dilution as u16::MAX.
const HDOP_UNKNOWN: f32 = 99.9;

/// Outbound side of the MAVLink connection.
struct Link {
    conn: Conn,
    sys_id: u8,
    comp_id: u8,
    target_sys: u8,
    target_comp: u8,
    sequence: AtomicU8,
}

impl Link {
    fn send(&self, msg: &MavMessage) -> Result<(), VehicleError> {
        let hdr = MavHeader {
            system_id: self.sys_id,
            component_id: self.comp_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        self.conn
            .send(&hdr, msg)
            .map_err(|e| VehicleError::Transport(format!("mavlink send: {:?}", e)))?;
        Ok(())
    }

    fn send_heartbeat(&self) -> Result<(), VehicleError> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.send(&MavMessage::HEARTBEAT(hb))
    }
}

/// Vehicle reached over MAVLink (PX4 or ArduPilot, common dialect).
pub struct MavVehicle {
    link: Arc<Link>,
    status: Arc<Mutex<LinkStatus>>,
    samples: broadcast::Sender<Result<TelemetrySample, TelemetryError>>,
    replies: broadcast::Sender<MavMessage>,
    rtl_after_mission: AtomicBool,
    command_timeout: Duration,
    shutdown: Arc<AtomicBool>,
    heartbeat: tokio::task::JoinHandle<()>,
}

impl MavVehicle {
    pub async fn connect(cfg: &VehicleConfig) -> Result<Self, VehicleError> {
        if let Some(rest) = cfg.address.strip_prefix("serial:") {
            let (dev, baud) = parse_serial(rest)?;
            // quick validate device
            let _ = tokio_serial::new(dev, baud)
                .open_native_async()
                .map_err(|e| VehicleError::Connection(format!("open serial device {}: {}", dev, e)))?;
        }

        let address = cfg.address.clone();
        let conn = tokio::task::spawn_blocking(move || mavlink::connect::<MavMessage>(&address))
            .await
            .map_err(|e| VehicleError::Connection(e.to_string()))?
            .map_err(|e| VehicleError::Connection(format!("mavlink connect {}: {}", cfg.address, e)))?;
        let conn: Conn = Arc::from(conn);
        info!(address = %cfg.address, "mav: link open");

        let link = Arc::new(Link {
            conn,
            sys_id: cfg.sys_id,
            comp_id: cfg.comp_id,
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            sequence: AtomicU8::new(0),
        });
        let status = Arc::new(Mutex::new(LinkStatus::default()));
        let (samples, _) = broadcast::channel(SAMPLE_BUFFER);
        let (replies, _) = broadcast::channel(REPLY_BUFFER);
        let shutdown = Arc::new(AtomicBool::new(false));

        // Reader runs on its own thread: MavConnection::recv blocks.
        {
            let link = link.clone();
            let status = status.clone();
            let samples = samples.clone();
            let replies = replies.clone();
            let shutdown = shutdown.clone();
            std::thread::Builder::new()
                .name("mav-reader".into())
                .spawn(move || read_loop(&link, &status, &samples, &replies, &shutdown))?;
        }

        let hb_hz = cfg.heartbeat_hz.unwrap_or(1.0).max(0.2);
        let heartbeat = tokio::spawn(heartbeat_loop(
            link.clone(),
            status.clone(),
            samples.clone(),
            Duration::from_secs_f32(1.0 / hb_hz),
            cfg.link_timeout(),
        ));

        Ok(Self {
            link,
            status,
            samples,
            replies,
            rtl_after_mission: AtomicBool::new(false),
            command_timeout: cfg.command_timeout(),
            shutdown,
            heartbeat,
        })
    }

    pub fn status(&self) -> LinkStatus {
        self.status.lock().unwrap().clone()
    }

    async fn next_reply(
        &self,
        rx: &mut broadcast::Receiver<MavMessage>,
        what: &'static str,
    ) -> Result<MavMessage, VehicleError> {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(msg) => return Ok(msg),
                    Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "mav: reply queue lagging"),
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(VehicleError::Transport("mavlink reader stopped".into()))
                    }
                }
            }
        };
        tokio::time::timeout(self.command_timeout, wait)
            .await
            .map_err(|_| VehicleError::Timeout(what))?
    }

    /// COMMAND_LONG, then wait for the matching COMMAND_ACK.
    async fn command(&self, name: &'static str, command: MavCmd, p: [f32; 7]) -> Result<(), VehicleError> {
        let mut rx = self.replies.subscribe();
        let cmd = COMMAND_LONG_DATA {
            target_system: self.link.target_sys,
            target_component: self.link.target_comp,
            command,
            confirmation: 0,
            param1: p[0],
            param2: p[1],
            param3: p[2],
            param4: p[3],
            param5: p[4],
            param6: p[5],
            param7: p[6],
        };
        info!("mav: sending {}", name);
        self.link.send(&MavMessage::COMMAND_LONG(cmd))?;

        loop {
            if let MavMessage::COMMAND_ACK(ack) = self.next_reply(&mut rx, name).await? {
                if ack.command != command {
                    continue;
                }
                return match ack.result {
                    MavResult::MAV_RESULT_ACCEPTED | MavResult::MAV_RESULT_IN_PROGRESS => Ok(()),
                    other => Err(VehicleError::CommandRejected { command: name, reason: format!("{:?}", other) }),
                };
            }
        }
    }
}

impl Drop for MavVehicle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.heartbeat.abort();
    }
}

#[async_trait]
impl Vehicle for MavVehicle {
    fn samples(&self, kind: StreamKind) -> SampleSource {
        let rx = self.samples.subscribe();
        stream::unfold(Some(rx), move |rx| async move {
            let mut rx = rx?;
            loop {
                match rx.recv().await {
                    Ok(Ok(sample)) if sample.kind() == kind => return Some((Ok(sample), Some(rx))),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => return Some((Err(e), Some(rx))),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%kind, skipped = n, "mav: telemetry subscriber lagging")
                    }
                    Err(broadcast::error::RecvError::Closed) => return Some((Err(TelemetryError::Closed), None)),
                }
            }
        })
        .boxed()
    }

    async fn arm(&self) -> Result<(), VehicleError> {
        self.command("arm", MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).await
    }

    async fn takeoff(&self, altitude_m: f32) -> Result<(), VehicleError> {
        // NAV_TAKEOFF wants AMSL; NaN lets the autopilot use its default height.
        let amsl = self.status.lock().unwrap().home_amsl_m.map(|h| h + altitude_m).unwrap_or(f32::NAN);
        self.command(
            "takeoff",
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, amsl],
        )
        .await
    }

    async fn land(&self) -> Result<(), VehicleError> {
        self.command("land", MavCmd::MAV_CMD_NAV_LAND, [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, f32::NAN])
            .await
    }

    async fn return_to_launch(&self) -> Result<(), VehicleError> {
        self.command("return_to_launch", MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, [0.0; 7]).await
    }

    async fn upload_mission(&self, plan: &MissionPlan) -> Result<(), VehicleError> {
        let rtl = self.rtl_after_mission.load(Ordering::Relaxed);
        let (items, index) = mission_items(plan, self.link.target_sys, self.link.target_comp, rtl);
        let count = u16::try_from(items.len())
            .map_err(|_| VehicleError::MissionRejected(format!("{} items is too many", items.len())))?;

        let mut rx = self.replies.subscribe();
        info!(count, "mav: mission upload");
        self.link.send(&MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count,
            target_system: self.link.target_sys,
            target_component: self.link.target_comp,
            ..Default::default()
        }))?;

        loop {
            let seq = match self.next_reply(&mut rx, "mission handshake").await? {
                MavMessage::MISSION_REQUEST_INT(r) => r.seq,
                MavMessage::MISSION_REQUEST(r) => r.seq,
                MavMessage::MISSION_ACK(ack) => {
                    if ack.mavtype != MavMissionResult::MAV_MISSION_ACCEPTED {
                        return Err(VehicleError::MissionRejected(format!("{:?}", ack.mavtype)));
                    }
                    break;
                }
                _ => continue,
            };
            let item = items
                .get(seq as usize)
                .ok_or_else(|| VehicleError::MissionRejected(format!("vehicle asked for item {} of {}", seq, count)))?;
            debug!(seq, "mav: mission item");
            self.link.send(&MavMessage::MISSION_ITEM_INT(item.clone()))?;
        }

        let mut st = self.status.lock().unwrap();
        st.mission_index = index;
        st.mission_total = plan.len() as u32;
        info!(waypoints = plan.len(), "mav: mission accepted");
        Ok(())
    }

    async fn start_mission(&self) -> Result<(), VehicleError> {
        self.command("start_mission", MavCmd::MAV_CMD_MISSION_START, [0.0; 7]).await
    }

    async fn set_return_to_launch_after_mission(&self, enable: bool) -> Result<(), VehicleError> {
        self.rtl_after_mission.store(enable, Ordering::Relaxed);
        Ok(())
    }
}

fn read_loop(
    link: &Link,
    status: &Mutex<LinkStatus>,
    samples: &broadcast::Sender<Result<TelemetrySample, TelemetryError>>,
    replies: &broadcast::Sender<MavMessage>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match link.conn.recv() {
            Ok((hdr, msg)) => {
                if hdr.system_id != link.target_sys {
                    continue;
                }
                let decoded = translate(&msg, &mut status.lock().unwrap());
                for sample in decoded {
                    // no subscribers is fine
                    let _ = samples.send(Ok(sample));
                }
                if is_reply(&msg) {
                    let _ = replies.send(msg);
                }
            }
            Err(MessageReadError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                ) => {}
            Err(MessageReadError::Io(e)) => {
                error!("mav: link read failed: {}", e);
                let _ = samples.send(Err(TelemetryError::Transport(e.to_string())));
                break;
            }
            Err(e) => debug!("mav: dropping undecodable frame: {:?}", e),
        }
    }
    debug!("mav: reader stopped");
}

async fn heartbeat_loop(
    link: Arc<Link>,
    status: Arc<Mutex<LinkStatus>>,
    samples: broadcast::Sender<Result<TelemetrySample, TelemetryError>>,
    every: Duration,
    link_timeout: Duration,
) {
    let mut tick = tokio::time::interval(every);
    loop {
        tick.tick().await;
        if let Err(e) = link.send_heartbeat() {
            warn!("mav: heartbeat send failed: {}", e);
        }
        let lost = {
            let mut st = status.lock().unwrap();
            let lost = st.heartbeat_lost(link_timeout);
            if lost {
                st.connected = false;
            }
            lost
        };
        if lost {
            warn!(timeout_ms = link_timeout.as_millis() as u64, "mav: autopilot heartbeat lost");
            let _ = samples.send(Ok(TelemetrySample::ConnectionState { connected: false }));
        }
    }
}

fn is_reply(msg: &MavMessage) -> bool {
    matches!(
        msg,
        MavMessage::COMMAND_ACK(_)
            | MavMessage::MISSION_REQUEST(_)
            | MavMessage::MISSION_REQUEST_INT(_)
            | MavMessage::MISSION_ACK(_)
    )
}

/// Turn one autopilot message into zero or more samples, updating link state.
fn translate(msg: &MavMessage, st: &mut LinkStatus) -> Vec<TelemetrySample> {
    match msg {
        MavMessage::HEARTBEAT(_) => {
            st.last_heartbeat = Some(Instant::now());
            st.connected = true;
            vec![TelemetrySample::ConnectionState { connected: true }]
        }
        MavMessage::SYS_STATUS(s) => {
            let mut out = Vec::with_capacity(2);
            // -1 means the autopilot does not estimate remaining charge
            if (0..=100).contains(&s.battery_remaining) {
                out.push(TelemetrySample::Battery { remaining: s.battery_remaining as f32 / 100.0 });
            }
            let healthy = s.onboard_control_sensors_health;
            out.push(TelemetrySample::Health(HealthState {
                global_position_ok: healthy.contains(MavSysStatusSensor::MAV_SYS_STATUS_SENSOR_GPS)
                    && st.gps_fix_type >= GpsFixType::GPS_FIX_TYPE_3D_FIX as u8,
                home_position_ok: st.home_seen,
                gyrometer_calibration_ok: healthy.contains(MavSysStatusSensor::MAV_SYS_STATUS_SENSOR_3D_GYRO),
            }));
            out
        }
        MavMessage::GPS_RAW_INT(g) => {
            let fix_type = g.fix_type as u8;
            st.gps_fix_type = fix_type;
            let satellites = if g.satellites_visible == u8::MAX { 0 } else { g.satellites_visible };
            let hdop = if g.eph == u16::MAX { HDOP_UNKNOWN } else { g.eph as f32 / 100.0 };
            vec![TelemetrySample::GpsInfo(GpsInfo { satellites, fix_type, hdop })]
        }
        MavMessage::HIGHRES_IMU(imu) => vec![TelemetrySample::Imu { temperature_c: imu.temperature }],
        MavMessage::GLOBAL_POSITION_INT(p) => {
            let pos = Position {
                latitude_deg: p.lat as f64 / 1e7,
                longitude_deg: p.lon as f64 / 1e7,
                relative_altitude_m: p.relative_alt as f32 / 1000.0,
                absolute_altitude_m: p.alt as f32 / 1000.0,
            };
            st.home_amsl_m = Some(pos.absolute_altitude_m - pos.relative_altitude_m);
            vec![TelemetrySample::Position(pos)]
        }
        MavMessage::HOME_POSITION(_) => {
            st.home_seen = true;
            Vec::new()
        }
        MavMessage::MISSION_CURRENT(m) if st.mission_total > 0 => vec![TelemetrySample::MissionProgress {
            current: st.plan_index(m.seq),
            total: st.mission_total,
        }],
        _ => Vec::new(),
    }
}

fn parse_serial(rest: &str) -> Result<(&str, u32), VehicleError> {
    let (dev, baud) = rest
        .rsplit_once(':')
        .ok_or_else(|| VehicleError::Connection(format!("serial address needs dev:baud, got {}", rest)))?;
    let baud = baud
        .parse()
        .map_err(|_| VehicleError::Connection(format!("bad baud rate {}", baud)))?;
    Ok((dev, baud))
}

/// Expand a plan into MAVLink mission items. Returns the items and, for each
/// item, the plan waypoint it belongs to.
fn mission_items(
    plan: &MissionPlan,
    target_sys: u8,
    target_comp: u8,
    rtl_after: bool,
) -> (Vec<MISSION_ITEM_INT_DATA>, Vec<u32>) {
    let mut items = Vec::new();
    let mut index = Vec::new();
    let mut push = |waypoint: u32, command: MavCmd, frame: MavFrame, p: [f32; 4], x: i32, y: i32, z: f32| {
        items.push(MISSION_ITEM_INT_DATA {
            param1: p[0],
            param2: p[1],
            param3: p[2],
            param4: p[3],
            x,
            y,
            z,
            seq: items.len() as u16,
            command,
            target_system: target_sys,
            target_component: target_comp,
            frame,
            current: 0,
            autocontinue: 1,
            ..Default::default()
        });
        index.push(waypoint);
    };

    let mission = MavFrame::MAV_FRAME_MISSION;
    let mut speed = None;
    for (i, it) in plan.items().iter().enumerate() {
        let wp = i as u32;
        if speed != Some(it.speed_m_s) && it.speed_m_s > 0.0 {
            push(wp, MavCmd::MAV_CMD_DO_CHANGE_SPEED, mission, [1.0, it.speed_m_s, -1.0, 0.0], 0, 0, 0.0);
            speed = Some(it.speed_m_s);
        }

        // stop briefly at waypoints that are not flown through
        let hold = if it.is_fly_through { it.loiter_time_s } else { it.loiter_time_s.max(0.5) };
        push(
            wp,
            MavCmd::MAV_CMD_NAV_WAYPOINT,
            MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            [hold, it.acceptance_radius_m, 0.0, it.yaw_deg],
            (it.latitude_deg * 1e7).round() as i32,
            (it.longitude_deg * 1e7).round() as i32,
            it.relative_altitude_m,
        );

        if it.gimbal_pitch_deg.is_some() || it.gimbal_yaw_deg.is_some() {
            let pitch = it.gimbal_pitch_deg.unwrap_or(0.0);
            let yaw = it.gimbal_yaw_deg.unwrap_or(0.0);
            // z = MAV_MOUNT_MODE_MAVLINK_TARGETING
            push(wp, MavCmd::MAV_CMD_DO_MOUNT_CONTROL, mission, [pitch, 0.0, yaw, 0.0], 0, 0, 2.0);
        }

        match it.camera_action {
            CameraAction::None => {}
            CameraAction::TakePhoto => {
                push(wp, MavCmd::MAV_CMD_IMAGE_START_CAPTURE, mission, [0.0, 0.0, 1.0, 0.0], 0, 0, 0.0)
            }
            CameraAction::StartPhotoInterval => push(
                wp,
                MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
                mission,
                [0.0, it.camera_photo_interval_s as f32, 0.0, 0.0],
                0,
                0,
                0.0,
            ),
            CameraAction::StopPhotoInterval => {
                push(wp, MavCmd::MAV_CMD_IMAGE_STOP_CAPTURE, mission, [0.0; 4], 0, 0, 0.0)
            }
            CameraAction::StartVideo => push(wp, MavCmd::MAV_CMD_VIDEO_START_CAPTURE, mission, [0.0; 4], 0, 0, 0.0),
            CameraAction::StopVideo => push(wp, MavCmd::MAV_CMD_VIDEO_STOP_CAPTURE, mission, [0.0; 4], 0, 0, 0.0),
            CameraAction::StartPhotoDistance => push(
                wp,
                MavCmd::MAV_CMD_DO_SET_CAM_TRIGG_DIST,
                mission,
                [it.camera_photo_distance_m, 0.0, 1.0, 0.0],
                0,
                0,
                0.0,
            ),
            CameraAction::StopPhotoDistance => {
                push(wp, MavCmd::MAV_CMD_DO_SET_CAM_TRIGG_DIST, mission, [0.0; 4], 0, 0, 0.0)
            }
        }
    }

    if rtl_after {
        let last = plan.len().saturating_sub(1) as u32;
        push(last, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, mission, [0.0; 4], 0, 0, 0.0);
    }
    (items, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{GPS_RAW_INT_DATA, MISSION_CURRENT_DATA, SYS_STATUS_DATA};
    use warden_proto::MissionItem;

    #[test]
    fn serial_addresses_split_on_the_last_colon() {
        let (dev, baud) = parse_serial("/dev/ttyUSB0:57600").unwrap();
        assert_eq!(dev, "/dev/ttyUSB0");
        assert_eq!(baud, 57600);
        assert!(parse_serial("/dev/ttyUSB0").is_err());
        assert!(parse_serial("/dev/ttyUSB0:fast").is_err());
    }

    #[test]
    fn mission_expands_speed_camera_and_rtl() {
        let a = MissionItem::waypoint(47.3977, 8.5456, 10.0, 3.0);
        let mut b = MissionItem::waypoint(47.3978, 8.5456, 10.0, 3.0);
        b.camera_action = CameraAction::TakePhoto;
        let mut c = MissionItem::waypoint(47.3978, 8.5457, 12.0, 5.0);
        c.is_fly_through = false;
        let plan = MissionPlan::new(vec![a, b, c]).unwrap();

        let (items, index) = mission_items(&plan, 1, 1, true);
        let cmds: Vec<MavCmd> = items.iter().map(|i| i.command).collect();
        assert_eq!(
            cmds,
            vec![
                MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
                MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH,
            ]
        );
        assert_eq!(index, vec![0, 0, 1, 1, 2, 2, 2]);
        assert!(items.iter().enumerate().all(|(i, it)| it.seq as usize == i));
        assert_eq!(items[1].x, 473_977_000);
        assert_eq!(items[5].param1, 0.5);
    }

    #[test]
    fn gps_and_battery_frames_become_samples() {
        let mut st = LinkStatus::default();

        let gps = GPS_RAW_INT_DATA {
            fix_type: GpsFixType::GPS_FIX_TYPE_3D_FIX,
            satellites_visible: 9,
            eph: 120,
            ..Default::default()
        };
        assert_eq!(
            translate(&MavMessage::GPS_RAW_INT(gps), &mut st),
            vec![TelemetrySample::GpsInfo(GpsInfo { satellites: 9, fix_type: 3, hdop: 1.2 })]
        );

        let sys = SYS_STATUS_DATA {
            battery_remaining: 42,
            onboard_control_sensors_health: MavSysStatusSensor::MAV_SYS_STATUS_SENSOR_GPS
                | MavSysStatusSensor::MAV_SYS_STATUS_SENSOR_3D_GYRO,
            ..Default::default()
        };
        let out = translate(&MavMessage::SYS_STATUS(sys), &mut st);
        assert_eq!(out[0], TelemetrySample::Battery { remaining: 0.42 });
        assert_eq!(
            out[1],
            TelemetrySample::Health(HealthState {
                global_position_ok: true,
                home_position_ok: false,
                gyrometer_calibration_ok: true,
            })
        );
    }

    #[test]
    fn mission_current_is_silent_until_a_plan_is_uploaded() {
        let mut st = LinkStatus::default();
        let cur = MavMessage::MISSION_CURRENT(MISSION_CURRENT_DATA { seq: 2, ..Default::default() });
        assert!(translate(&cur, &mut st).is_empty());

        st.mission_index = vec![0, 0, 1, 2];
        st.mission_total = 3;
        assert_eq!(
            translate(&cur, &mut st),
            vec![TelemetrySample::MissionProgress { current: 1, total: 3 }]
        );
    }
}
