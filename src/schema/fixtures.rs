//! Descriptor pool shared by unit tests.
//!
//! ```text
//! package game.leaderboard;
//!
//! enum Region { REGION_UNSPECIFIED = 0; EU = 1; NA = 2; }
//! message Entry { int64 user_id = 1; string name = 2; int64 score = 3; Region region = 4; }
//! message GetTopRequest { int32 count = 1; Region region = 2; }
//! message GetTopResponse { repeated Entry entries = 1; }
//! message Profile {
//!   int64 user_id = 1; string name = 2; bool active = 3; uint32 level = 4;
//!   double rating = 5; float ratio = 6; bytes avatar = 7; Region region = 8;
//!   Entry best = 9; repeated string tags = 10; map<string, int64> stats = 11;
//!   sint32 delta = 12; fixed64 token = 13;
//! }
//! service LeaderboardService {
//!   rpc GetTop(GetTopRequest) returns (GetTopResponse);
//!   rpc UpdateProfile(Profile) returns (Entry);
//! }
//! ```

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, MethodDescriptorProto,
    ServiceDescriptorProto,
};

fn field(name: &str, json: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        json_name: Some(json.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(Into::into),
        ..Default::default()
    }
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.into()),
        field: fields,
        ..Default::default()
    }
}

pub(crate) fn leaderboard_pool() -> DescriptorPool {
    let region = EnumDescriptorProto {
        name: Some("Region".into()),
        value: ["REGION_UNSPECIFIED", "EU", "NA"]
            .iter()
            .enumerate()
            .map(|(i, name)| EnumValueDescriptorProto {
                name: Some((*name).into()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let mut stats_entry = message(
        "StatsEntry",
        vec![
            field("key", "key", 1, Type::String, None),
            field("value", "value", 2, Type::Int64, None),
        ],
    );
    stats_entry.options = Some(MessageOptions {
        map_entry: Some(true),
        ..Default::default()
    });

    let mut profile = message(
        "Profile",
        vec![
            field("user_id", "userId", 1, Type::Int64, None),
            field("name", "name", 2, Type::String, None),
            field("active", "active", 3, Type::Bool, None),
            field("level", "level", 4, Type::Uint32, None),
            field("rating", "rating", 5, Type::Double, None),
            field("ratio", "ratio", 6, Type::Float, None),
            field("avatar", "avatar", 7, Type::Bytes, None),
            field("region", "region", 8, Type::Enum, Some(".game.leaderboard.Region")),
            field("best", "best", 9, Type::Message, Some(".game.leaderboard.Entry")),
            repeated(field("tags", "tags", 10, Type::String, None)),
            repeated(field("stats", "stats", 11, Type::Message, Some(".game.leaderboard.Profile.StatsEntry"))),
            field("delta", "delta", 12, Type::Sint32, None),
            field("token", "token", 13, Type::Fixed64, None),
        ],
    );
    profile.nested_type = vec![stats_entry];

    let file = FileDescriptorProto {
        name: Some("game/leaderboard.proto".into()),
        package: Some("game.leaderboard".into()),
        syntax: Some("proto3".into()),
        enum_type: vec![region],
        message_type: vec![
            message(
                "Entry",
                vec![
                    field("user_id", "userId", 1, Type::Int64, None),
                    field("name", "name", 2, Type::String, None),
                    field("score", "score", 3, Type::Int64, None),
                    field("region", "region", 4, Type::Enum, Some(".game.leaderboard.Region")),
                ],
            ),
            message(
                "GetTopRequest",
                vec![
                    field("count", "count", 1, Type::Int32, None),
                    field("region", "region", 2, Type::Enum, Some(".game.leaderboard.Region")),
                ],
            ),
            message(
                "GetTopResponse",
                vec![repeated(field("entries", "entries", 1, Type::Message, Some(".game.leaderboard.Entry")))],
            ),
            profile,
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("LeaderboardService".into()),
            method: vec![
                MethodDescriptorProto {
                    name: Some("GetTop".into()),
                    input_type: Some(".game.leaderboard.GetTopRequest".into()),
                    output_type: Some(".game.leaderboard.GetTopResponse".into()),
                    ..Default::default()
                },
                MethodDescriptorProto {
                    name: Some("UpdateProfile".into()),
                    input_type: Some(".game.leaderboard.Profile".into()),
                    output_type: Some(".game.leaderboard.Entry".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .expect("fixture descriptors are valid")
}
