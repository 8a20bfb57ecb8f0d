//! Generate test vectors for front-end interop testing.
//!
//! Prints each envelope as MessagePack bytes and as JSON.
//!
//! Run with: cargo run --package protocol --example test_vectors

use protocol::messages::*;

fn main() {
    let get_file = Envelope::new(
        1,
        Message::GetFile(GetFileRequest {
            path: "a".to_string(),
            depth: 2,
        }),
    );
    print_test_vector("get_file", &get_file);

    let stats = FileStats {
        name: "c.txt".to_string(),
        path: "/sandbox/a/b/c.txt".to_string(),
        file_type: FileType::File,
        uid: 1000,
        gid: 1000,
        owner: "alice".to_string(),
        group: Some("staff".to_string()),
        size: 12,
        created: 1704067200.0,
        modified: 1704067200.0,
        is_link: false,
        link_target: None,
    };
    let tree = Envelope::new(
        1,
        Message::FileTree(FileTree {
            path: stats.path.clone(),
            stats,
            children: None,
            skipped: Vec::new(),
        }),
    );
    print_test_vector("file_tree_leaf", &tree);

    let error = Envelope::new(
        2,
        Message::Error(ErrorMessage {
            code: ErrorCode::PathTraversal,
            message: "paths containing \"..\" are not allowed".to_string(),
            context: Some("../etc/passwd".to_string()),
        }),
    );
    print_test_vector("error_traversal", &error);
}

fn print_test_vector(name: &str, envelope: &Envelope) {
    let bytes = envelope.to_msgpack().expect("serialization failed");
    print!("export const {} = new Uint8Array([", name);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            print!(", ");
        }
        print!("{}", b);
    }
    println!("]);");

    let json = envelope.to_json().expect("serialization failed");
    println!("export const {}_json = {};", name, json);
}
