//! Simple-form CID object records.
//!
//! These are the flat records pulled out of CID bins whose type comes from
//! the file name rather than a container header. Strings and lists marked as
//! DP-backed live in the companion `dp_` side table; the record itself only
//! stores packed offset words, so those fields decode to `Option`/empty when
//! the side table misses.
//!
//! Field layouts follow the engine's serializers; `skip`/`unk` fields are
//! unknown bytes preserved verbatim.

use rmd_stream::ByteStream;

use crate::error::Result;
use crate::fields::{DecodeCtx, FieldDriver};
use crate::types::{BoundBox, Gid, Mat3, ObjectId, Rid, Vec2, Vec3};

macro_rules! stream_objects {
    (
        $(
            $(#[$meta:meta])*
            $name:ident {
                $( $field:ident : $ftype:ty = $bind:expr ),* $(,)?
            }
        )*
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name {
                $( pub $field: $ftype, )*
            }

            impl $name {
                pub fn read(stream: &mut ByteStream, ctx: DecodeCtx) -> Result<Self> {
                    let mut driver = FieldDriver::new(stream, ctx, stringify!($name));
                    $( let $field: $ftype = driver.field(stringify!($field), $bind)?; )*
                    let _ = &mut driver;
                    Ok(Self { $( $field, )* })
                }
            }
        )*
    };
}

fn rid(s: &mut ByteStream) -> Result<Rid> {
    Ok(Rid::read(s)?)
}

fn oid(s: &mut ByteStream) -> Result<ObjectId> {
    Ok(ObjectId::read(s)?)
}

fn vec2(s: &mut ByteStream) -> Result<Vec2> {
    Ok(Vec2::read(s)?)
}

fn u32v(s: &mut ByteStream) -> Result<u32> {
    Ok(s.u32()?)
}

fn i32v(s: &mut ByteStream) -> Result<i32> {
    Ok(s.i32()?)
}

fn f32v(s: &mut ByteStream) -> Result<f32> {
    Ok(s.f32()?)
}

stream_objects! {
    ScriptVariablesV1 {
        code_count: u32 = FieldDriver::u32,
        code_offset: u32 = FieldDriver::u32,
        handlers_count: u32 = FieldDriver::u32,
        handlers_offset: u32 = FieldDriver::u32,
        variables_count: u32 = FieldDriver::u32,
        variables_offset: u32 = FieldDriver::u32,
        signals_count: u32 = FieldDriver::u32,
        signals_offset: u32 = FieldDriver::u32,
    }

    ScriptVariablesV2 {
        code_count: u32 = FieldDriver::u32,
        code_offset: u32 = FieldDriver::u32,
        handlers_count: u32 = FieldDriver::u32,
        handlers_offset: u32 = FieldDriver::u32,
        variables_count: u32 = FieldDriver::u32,
        variables_offset: u32 = FieldDriver::u32,
        signals_count: u32 = FieldDriver::u32,
        signals_offset: u32 = FieldDriver::u32,
        debug_entries_count: u32 = FieldDriver::u32,
        debug_entries_offset: u32 = FieldDriver::u32,
    }

    /// Shared shape of every `*script` record.
    Script {
        gid: Gid = FieldDriver::gid,
        script: ScriptVariablesV1 = |d| d.subitem(ScriptVariablesV1::read),
    }

    DynamicObjectScriptV3 {
        gid: Gid = FieldDriver::gid,
        script: ScriptVariablesV1 = |d| d.subitem(ScriptVariablesV1::read),
        value: u32 = FieldDriver::u32,
        skip: Vec<u8> = |d| d.bytes(4),
    }

    CharacterScriptV3 {
        gid: Gid = FieldDriver::gid,
        script: ScriptVariablesV1 = |d| d.subitem(ScriptVariablesV1::read),
        skip: Vec<u8> = |d| d.bytes(8),
    }

    FloatingScriptV2 {
        gid: Gid = FieldDriver::gid,
        script: ScriptVariablesV1 = |d| d.subitem(ScriptVariablesV1::read),
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
    }

    ScriptInstanceV1 {
        attachment_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
    }

    GameEventV5 {
        script: ScriptVariablesV1 = |d| d.subitem(ScriptVariablesV1::read),
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        skip: Vec<u8> = |d| d.bytes(8),
    }

    KeyFrameAnimationV5 {
        gid: Gid = FieldDriver::gid,
        start_key_frame: u32 = FieldDriver::u32,
        end_key_frame: u32 = FieldDriver::u32,
        length: f32 = FieldDriver::f32,
        unk1: Vec<u32> = |d| d.dp_list("u32", u32v),
        unk2: Vec<f32> = |d| d.dp_list("f32", f32v),
        unk3: Vec<f32> = |d| d.dp_list("f32", f32v),
        animation_resource: Rid = FieldDriver::rid,
        skip: Vec<u8> = |d| d.bytes(4),
        next_animation: Gid = FieldDriver::gid,
    }

    KeyFramerV3 {
        gid: Gid = FieldDriver::gid,
        key_frames: Vec<ObjectId> = |d| d.dp_list("oid", oid),
        key_frame_animations: Vec<ObjectId> = |d| d.dp_list("oid", oid),
        parent_key_framer: ObjectId = FieldDriver::oid,
        initial_keyframe: u32 = FieldDriver::u32,
        attachment_container: ObjectId = FieldDriver::oid,
        resources: Vec<Rid> = |d| d.dp_list("rid", rid),
        val1: bool = FieldDriver::boolean,
    }

    KeyFrameV1 {
        position: Vec3 = FieldDriver::vec3,
        rotation: Mat3 = FieldDriver::mat3,
    }

    /// v4 serializes no second transform; it defaults to identity/zero.
    KeyFramedObjectV4 {
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        physics_resource: Rid = FieldDriver::rid,
        source: Option<String> = FieldDriver::dp_str,
        mesh_resource: Rid = FieldDriver::rid,
        name: Option<String> = FieldDriver::dp_str,
        skip1: Vec<u8> = |d| d.bytes(8),
        resources: Vec<Rid> = |d| d.dp_list("rid", rid),
        gid: Gid = FieldDriver::gid,
        key_framer: ObjectId = FieldDriver::oid,
        skip2: Vec<u8> = |d| d.bytes(5),
        rotation2: Mat3 = |_| Ok(Mat3::default()),
        position2: Vec3 = |_| Ok(Vec3::default()),
    }

    KeyFramedObjectV5 {
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        physics_resource: Rid = FieldDriver::rid,
        source: Option<String> = FieldDriver::dp_str,
        mesh_resource: Rid = FieldDriver::rid,
        name: Option<String> = FieldDriver::dp_str,
        skip1: Vec<u8> = |d| d.bytes(8),
        resources: Vec<Rid> = |d| d.dp_list("rid", rid),
        gid: Gid = FieldDriver::gid,
        key_framer: ObjectId = FieldDriver::oid,
        skip2: Vec<u8> = |d| d.bytes(5),
        rotation2: Mat3 = FieldDriver::mat3,
        position2: Vec3 = FieldDriver::vec3,
    }

    NotebookPageV2 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        skip: Vec<u8> = |d| d.bytes(8),
        episode_number: u32 = FieldDriver::u32,
        id: u32 = FieldDriver::u32,
        only_in_nightmare: bool = FieldDriver::boolean,
    }

    CharacterClassV38 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        base_classes: Vec<Option<String>> = |d| d.dp_str_list(Some(4)),
        skeleton_gid: Gid = FieldDriver::gid,
        strong_shield: bool = FieldDriver::boolean,
        kickback_multiplier: f32 = FieldDriver::f32,
        time_between_dazzles: f32 = FieldDriver::f32,
        endskip: Vec<u8> = |d| d.bytes(0x49),
    }

    CharacterClassV42 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        base_classes: Vec<Option<String>> = |d| d.dp_str_list(None),
        skeleton_gid: Gid = FieldDriver::gid,
        parent_name: Option<String> = FieldDriver::dp_str,
        capsule_height: f32 = FieldDriver::f32,
        capsule_radius: f32 = FieldDriver::f32,
        lethal_dose_of_hit_energy: f32 = FieldDriver::f32,
        health_recovery_start_delay: f32 = FieldDriver::f32,
        health_recovery_time: f32 = FieldDriver::f32,
        shadow_shield_strength: f32 = FieldDriver::f32,
        strong_shield: bool = FieldDriver::boolean,
        kickback_multiplier: f32 = FieldDriver::f32,
        time_between_dazzles: f32 = FieldDriver::f32,
        animations: Vec<ObjectId> = |d| d.dp_list("oid", oid),
        animation_parameters: AnimationParameters = |d| d.subitem(AnimationParameters::read),
        class_type: Option<String> = FieldDriver::dp_str,
        skip: Vec<u8> = |d| d.bytes(8),
    }

    TriggerV18 {
        attachment_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        skip1: Vec<u8> = |d| d.bytes(4),
        identifier: Option<String> = FieldDriver::dp_str,
        skip2: Vec<u8> = |d| d.bytes(4),
        locale_string: Option<String> = FieldDriver::dp_str,
        skip3: Vec<u8> = |d| d.bytes(12),
        values: Vec<i32> = |d| d.dp_list("i32", i32v),
        skip4: Vec<u8> = |d| d.bytes(3),
    }

    TriggerV20 {
        attachment_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        skip1: Vec<u8> = |d| d.bytes(4),
        identifier: Option<String> = FieldDriver::dp_str,
        skip2: Vec<u8> = |d| d.bytes(4),
        locale_string: Option<String> = FieldDriver::dp_str,
        skip3: Vec<u8> = |d| d.bytes(12),
        values: Vec<i32> = |d| d.dp_list("i32", i32v),
        skip4: Vec<u8> = |d| d.bytes(7),
    }

    SkeletonV25 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        resource: Rid = FieldDriver::rid,
        id: u32 = FieldDriver::u32,
    }

    SkeletonSetupV1 {
        root_bone_gid: Gid = FieldDriver::gid,
        identifier: Option<String> = FieldDriver::dp_str,
        unknown: Vec<u8> = |d| d.bytes(7),
    }

    AreaTriggerV3 {
        gid: Gid = FieldDriver::gid,
        value: u32 = FieldDriver::u32,
        identifier: Option<String> = FieldDriver::dp_str,
        positions: Vec<Vec2> = |d| d.dp_list("vec2", vec2),
        skip: Vec<u8> = |d| d.bytes(32),
    }

    AnimationV17 {
        gid: Gid = FieldDriver::gid,
        skeleton_gid: Gid = FieldDriver::gid,
        id: u32 = FieldDriver::u32,
        resource: Rid = FieldDriver::rid,
        skip: Vec<u8> = |d| d.bytes(1),
        name: Option<String> = FieldDriver::dp_str,
        use_fingers_left: bool = FieldDriver::boolean,
        use_fingers_right: bool = FieldDriver::boolean,
        use_foot_ik: bool = FieldDriver::boolean,
        attach_left_hand: bool = FieldDriver::boolean,
        leg_sync_loop_count: u32 = FieldDriver::u32,
        scripted_blend_in: bool = FieldDriver::boolean,
        scripted_blend_in_time: f32 = FieldDriver::f32,
        scripted_blend_out: bool = FieldDriver::boolean,
        scripted_move_capsule: bool = FieldDriver::boolean,
    }

    AnimationV19 {
        gid: Gid = FieldDriver::gid,
        skeleton_gid: Gid = FieldDriver::gid,
        id: u32 = FieldDriver::u32,
        resource: Rid = FieldDriver::rid,
        name: Option<String> = FieldDriver::dp_str,
        use_fingers_left: bool = FieldDriver::boolean,
        use_fingers_right: bool = FieldDriver::boolean,
        use_foot_ik: bool = FieldDriver::boolean,
        attach_left_hand: bool = FieldDriver::boolean,
        leg_sync_loop_count: u32 = FieldDriver::u32,
        scripted_blend_in: bool = FieldDriver::boolean,
        scripted_blend_in_time: f32 = FieldDriver::f32,
        scripted_blend_out: bool = FieldDriver::boolean,
        scripted_move_capsule: bool = FieldDriver::boolean,
    }

    WeaponV33 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        physics_resource: Rid = FieldDriver::rid,
        mesh_resource: Rid = FieldDriver::rid,
        path: Option<String> = FieldDriver::dp_str,
        skip: Vec<u8> = |d| d.bytes(103),
    }

    WeaponV39 {
        gid: Gid = FieldDriver::gid,
        name: Option<String> = FieldDriver::dp_str,
        physics_resource: Rid = FieldDriver::rid,
        mesh_resource: Rid = FieldDriver::rid,
        path: Option<String> = FieldDriver::dp_str,
        melee: bool = FieldDriver::boolean,
        accuracy: f32 = FieldDriver::f32,
        energy: f32 = FieldDriver::f32,
        scatter_count: u32 = FieldDriver::u32,
        energy_hotspot_range: f32 = FieldDriver::f32,
        energy_falloff_range: f32 = FieldDriver::f32,
        max_carried_bullets: u32 = FieldDriver::u32,
        clip_size: u32 = FieldDriver::u32,
        two_handed: bool = FieldDriver::boolean,
        time_between_shots: f32 = FieldDriver::f32,
        shoots_flares: bool = FieldDriver::boolean,
        pump_action: bool = FieldDriver::boolean,
        low_clip_limit: u32 = FieldDriver::u32,
        low_ammo_limit: u32 = FieldDriver::u32,
        recoil: f32 = FieldDriver::f32,
        aim_fov_multiplier: f32 = FieldDriver::f32,
        pickup_ammo_count: u32 = FieldDriver::u32,
        auto_aim_distance: f32 = FieldDriver::f32,
        automatic: bool = FieldDriver::boolean,
        taken_kick_back: f32 = FieldDriver::f32,
        skip_39: Vec<u8> = |d| d.bytes(4),
        identifier: Option<String> = FieldDriver::dp_str,
        skip: Vec<u8> = |d| d.bytes(38),
    }

    DynamicObjectV11 {
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        physics_resource: Rid = FieldDriver::rid,
        resource_path: Option<String> = FieldDriver::dp_str,
        mesh_resource: Rid = FieldDriver::rid,
        identifier: Option<String> = FieldDriver::dp_str,
        value_unknown1: u32 = FieldDriver::u32,
        attachment_container: ObjectId = FieldDriver::oid,
        value_unknown3: u32 = FieldDriver::u32,
        value_name3: u32 = FieldDriver::u32,
        gid: Gid = FieldDriver::gid,
        skip: Vec<u8> = |d| d.bytes(9),
    }

    DynamicObjectV13 {
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        physics_resource: Rid = FieldDriver::rid,
        resource_path: Option<String> = FieldDriver::dp_str,
        mesh_resource: Rid = FieldDriver::rid,
        identifier: Option<String> = FieldDriver::dp_str,
        value_unknown1: u32 = FieldDriver::u32,
        attachment_container: ObjectId = FieldDriver::oid,
        value_unknown3: u32 = FieldDriver::u32,
        value_name3: u32 = FieldDriver::u32,
        gid: Gid = FieldDriver::gid,
        skip: Vec<u8> = |d| d.bytes(13),
    }

    TaskDefinitionV11 {
        name: Option<String> = FieldDriver::dp_str,
        values: Vec<u32> = |d| d.dp_list("u32", u32v),
        skip: Vec<u8> = |d| d.bytes(8),
        root_task: bool = FieldDriver::boolean,
        top_level_task: bool = FieldDriver::boolean,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        activate_on_startup: bool = FieldDriver::boolean,
        gidless_task: bool = FieldDriver::boolean,
        gid: Gid = FieldDriver::gid,
        b2: bool = FieldDriver::boolean,
        end_data: Vec<u8> = |d| d.bytes(0x44),
    }

    TaskDefinitionV15 {
        name: Option<String> = FieldDriver::dp_str,
        values: Vec<u32> = |d| d.dp_list("u32", u32v),
        skip: Vec<u8> = |d| d.bytes(8),
        root_task: bool = FieldDriver::boolean,
        top_level_task: bool = FieldDriver::boolean,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        activate_on_startup: bool = FieldDriver::boolean,
        activate_on_startup_round: Vec<bool> = |d| d.iter(Some(3), FieldDriver::boolean),
        gidless_task: bool = FieldDriver::boolean,
        gid: Gid = FieldDriver::gid,
        b2: bool = FieldDriver::boolean,
        rotation_player: Mat3 = FieldDriver::mat3,
        position_player: Vec3 = FieldDriver::vec3,
        player_character1: Gid = FieldDriver::gid,
        skip2: Vec<u8> = |d| d.bytes(8),
        cinematic: Option<String> = FieldDriver::dp_str,
        player_character2: Gid = FieldDriver::gid,
        player_character3: Gid = FieldDriver::gid,
    }

    AttachmentContainerV7 {
        spot_lights: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        particle_systems: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        sound_instances: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        simulated_sound_instances: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        point_lights: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        ambient_lights: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        triggers: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        script_instances: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
        lens_flares: Vec<Gid> = |d| d.dp_list("gid", |s| Ok(Gid::read(s)?)),
    }

    AmbientLightInstance {
        script_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        position: Vec3 = FieldDriver::vec3,
        color: Vec3 = FieldDriver::vec3,
        decay: f32 = FieldDriver::f32,
        auto_start: bool = FieldDriver::boolean,
        intensity: f32 = FieldDriver::f32,
    }

    AnimationParameters {
        animation_blend_time: f32 = FieldDriver::f32,
        half_rotation_time: f32 = FieldDriver::f32,
        tilt_gain: f32 = FieldDriver::f32,
        tilt_regression: f32 = FieldDriver::f32,
        tilt_angle_radians: f32 = FieldDriver::f32,
        tilt_agility: f32 = FieldDriver::f32,
        tilt_scale_forward: f32 = FieldDriver::f32,
        tilt_scale_backwards: f32 = FieldDriver::f32,
        animation_profile: u32 = FieldDriver::u32,
    }

    TaskContent {
        skip1: Vec<u8> = |d| d.bytes(12),
        resources: Vec<Rid> = |d| d.dp_list("rid", rid),
        skip2: Vec<u8> = |d| d.bytes(8),
        attachment: Vec<u8> = |d| d.bytes(24),
        value: Vec<u32> = |d| d.iter(None, FieldDriver::u32),
    }

    PhysicsMaterialV2 {
        gid: Gid = FieldDriver::gid,
        index: u8 = FieldDriver::u8,
        name: String = FieldDriver::nts,
    }

    WaypointV1 {
        gid: Gid = FieldDriver::gid,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
    }

    SpotLightV20 {
        attachment_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        position: Vec3 = FieldDriver::vec3,
        rotation: Mat3 = FieldDriver::mat3,
        color: Vec3 = FieldDriver::vec3,
        cone_angle: f32 = FieldDriver::f32,
        decay: f32 = FieldDriver::f32,
        light_map: Rid = FieldDriver::rid,
        shadow_map: Rid = FieldDriver::rid,
        cast_shadows: bool = FieldDriver::boolean,
        shadow_map_resolution: u32 = FieldDriver::u32,
        shadow_map_filtering: u32 = FieldDriver::u32,
        autostart: bool = FieldDriver::boolean,
        volumetric: bool = FieldDriver::boolean,
        intensity: f32 = FieldDriver::f32,
        volumetric_decay: f32 = FieldDriver::f32,
        light_volume_resource: Rid = FieldDriver::rid,
        volumetric_effect: u32 = FieldDriver::u32,
        mesh_resource: Rid = FieldDriver::rid,
        mesh_position: Vec3 = FieldDriver::vec3,
        mesh_rotation: Vec3 = FieldDriver::vec3,
        near: f32 = FieldDriver::f32,
        depth_bias: f32 = FieldDriver::f32,
        depth_slope_bias: f32 = FieldDriver::f32,
        far: f32 = FieldDriver::f32,
        drain_multiplier: f32 = FieldDriver::f32,
        controllable: bool = FieldDriver::boolean,
        enable_specular: bool = FieldDriver::boolean,
        volumetric_only: bool = FieldDriver::boolean,
        skip: Vec<u8> = |d| d.bytes(8),
        volumetric_quality: u32 = FieldDriver::u32,
    }

    StaticObjectV10 {
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        physics_resource: Rid = FieldDriver::rid,
        skip_4: Vec<u8> = |d| d.bytes(4),
        mesh_resource: Rid = FieldDriver::rid,
        skip_17: Vec<u8> = |d| d.bytes(17),
    }

    SoundV21 {
        gid: Gid = FieldDriver::gid,
        threed: bool = FieldDriver::boolean,
        streamed: bool = FieldDriver::boolean,
        looping: u32 = FieldDriver::u32,
        volume: f32 = FieldDriver::f32,
        hotspot: f32 = FieldDriver::f32,
        falloff: f32 = FieldDriver::f32,
        volume_variation: f32 = FieldDriver::f32,
        frequency_variation: f32 = FieldDriver::f32,
        skip1: Vec<u8> = |d| d.bytes(0x26),
        resource: Rid = FieldDriver::rid,
        skip2: Vec<u8> = |d| d.bytes(7),
    }

    CellInfoV1 {
        x: u32 = FieldDriver::u32,
        y: u32 = FieldDriver::u32,
        low_detail_foliage_count: i32 = FieldDriver::i32,
        high_detail_foliage_count: i32 = FieldDriver::i32,
    }

    CharacterV13 {
        gid: Gid = FieldDriver::gid,
        class_gid: Gid = FieldDriver::gid,
        skip1: Vec<u8> = |d| d.bytes(1),
        mesh_resource: Rid = FieldDriver::rid,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        resources: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
        skip: Vec<u8> = |d| d.bytes(58),
    }

    CharacterV17 {
        gid: Gid = FieldDriver::gid,
        class_gid: Gid = FieldDriver::gid,
        mesh_resource: Rid = FieldDriver::rid,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        resources: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
        skip: Vec<u8> = |d| d.bytes(4),
        identifier: String = FieldDriver::istr,
        cloth_resource: Rid = FieldDriver::rid,
        cloth_params: Vec<u8> = |d| d.bytes(48),
        fxa_resource: Rid = FieldDriver::rid,
        skip2: Vec<u8> = |d| d.bytes(1),
        animgraph_resource: Rid = FieldDriver::rid,
        skip3: Vec<u8> = |d| d.bytes(9),
        unkr1: Rid = FieldDriver::rid,
        unkr2: Rid = FieldDriver::rid,
        unkr3: Rid = FieldDriver::rid,
        unkr4: Rid = FieldDriver::rid,
    }

    PointLightV11 {
        attachment_gid: Gid = FieldDriver::gid,
        skip: Vec<u8> = |d| d.bytes(12),
    }

    PointLightV13 {
        attachment_gid: Gid = FieldDriver::gid,
        gid: Gid = FieldDriver::gid,
        rotation: Mat3 = FieldDriver::mat3,
        position: Vec3 = FieldDriver::vec3,
        color: Vec3 = FieldDriver::vec3,
        decay: f32 = FieldDriver::f32,
        directional_falloff: f32 = FieldDriver::f32,
        auto_start: bool = FieldDriver::boolean,
        cast_shadows: bool = FieldDriver::boolean,
        intensity: f32 = FieldDriver::f32,
        mesh_rid: Rid = FieldDriver::rid,
        static_shadow_map_rid: Rid = FieldDriver::rid,
        mesh_rotation: Mat3 = FieldDriver::mat3,
        mesh_position: Vec3 = FieldDriver::vec3,
        drain_multiplier: f32 = FieldDriver::f32,
        enable_specular: bool = FieldDriver::boolean,
        shadow_map_range: f32 = FieldDriver::f32,
        enable_range_clip: bool = FieldDriver::boolean,
        range_clip: f32 = FieldDriver::f32,
        skip: Vec<u8> = |d| d.bytes(0x94),
    }

    // Metadata records carried by streamed-resource bins and simple-form
    // metadata CID bins. Plain records, never DP-backed.

    TextureMetadataRecV1 {
        kind: u32 = FieldDriver::u32,
        format: u32 = FieldDriver::u32,
        filter: u32 = FieldDriver::u32,
        width: u32 = FieldDriver::u32,
        height: u32 = FieldDriver::u32,
        depth: u32 = FieldDriver::u32,
        skip: Vec<u8> = |d| d.bytes(4),
        mipmap_offsets: Vec<i32> = |d| d.iter(Some(8), FieldDriver::i32),
        high_detail_stream_distance: f32 = FieldDriver::f32,
        use_texture_lod: bool = FieldDriver::boolean,
    }

    FileInfoMetadataRecV1 {
        file_size: u32 = FieldDriver::u32,
        file_data_crc: u32 = FieldDriver::u32,
        flags: u32 = FieldDriver::u32,
    }

    HavokAnimationMetadataRecV1 {
        animation_event_path: String = FieldDriver::istr,
    }

    ParticleSystemMetadataRecV1 {
        texture_resources: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
    }

    MeshMetadataRecV1 {
        vertex_buffer_bytes: u32 = FieldDriver::u32,
        index_count: u32 = FieldDriver::u32,
        bound_box: BoundBox = FieldDriver::bound_box,
        has_bones: bool = FieldDriver::boolean,
        texture_rids: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
    }

    FoliageMeshMetadataRecV1 {
        vertex_buffer_bytes: u32 = FieldDriver::u32,
        index_count: u32 = FieldDriver::u32,
        bound_box: BoundBox = FieldDriver::bound_box,
        texture_rids: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn script_variables_fixed_layout() {
        let mut data = Vec::new();
        for v in 1u32..=8 {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut stream = ByteStream::new(&data);
        let sv = ScriptVariablesV1::read(&mut stream, DecodeCtx::default()).unwrap();
        assert_eq!(sv.code_count, 1);
        assert_eq!(sv.signals_offset, 8);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn script_nests_variables() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 9, 0, 0, 0, 1]); // GID 9:1
        for v in 0u32..8 {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut stream = ByteStream::new(&data);
        let script = Script::read(&mut stream, DecodeCtx::default()).unwrap();
        assert_eq!(script.gid, Gid { kind: 9, id: 1 });
        assert_eq!(script.script.handlers_count, 2);
    }

    #[test]
    fn keyframed_object_v4_defaults_second_transform() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; 36]); // rotation
        data.extend_from_slice(&[0u8; 12]); // position
        data.extend_from_slice(&[1, 2, 3, 4]); // physics rid
        data.extend_from_slice(&0u32.to_le_bytes()); // source offset word (flagless)
        data.extend_from_slice(&[5, 6, 7, 8]); // mesh rid
        data.extend_from_slice(&0u32.to_le_bytes()); // name offset word
        data.extend_from_slice(&[0u8; 8]); // skip1
        data.extend_from_slice(&0u32.to_le_bytes()); // resources count
        data.extend_from_slice(&0u32.to_le_bytes()); // resources offset
        data.extend_from_slice(&[0u8; 8]); // gid
        data.extend_from_slice(&0u32.to_le_bytes()); // key framer
        data.extend_from_slice(&[0u8; 5]); // skip2
        let mut stream = ByteStream::new(&data);
        let obj = KeyFramedObjectV4::read(&mut stream, DecodeCtx::default()).unwrap();
        assert_eq!(obj.rotation2, Mat3::default());
        assert_eq!(obj.position2, Vec3::default());
        assert_eq!(stream.remaining(), 0);
    }
}
