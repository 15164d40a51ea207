// Year-partitioned `subjects_<year>` tables share the layout of `subjects`
// and are queried with raw SQL, so only the fixed tables appear here.

diesel::table! {
    subjects (subject_id) {
        subject_id -> Int8,
        subject_name -> Text,
        subject_name_english -> Text,
        stage -> Text,
        semester -> Text,
        department -> Text,
        max_theory_mark -> Int4,
        max_lab_mark -> Int4,
        max_semester_mark -> Int4,
        max_final_exam -> Int4,
        credits -> Int4,
        active -> Text,
        ministerial -> Text,
    }
}

diesel::table! {
    students (student_id) {
        student_id -> Int8,
        student_name -> Text,
        stage -> Text,
    }
}

diesel::table! {
    exempteds (exempted_id) {
        exempted_id -> Int8,
        student_id -> Int8,
        subject_id -> Int8,
    }
}

diesel::table! {
    privileges (privilege_id) {
        privilege_id -> Int8,
        user_id -> Int8,
        resource -> Text,
        stage -> Text,
        can_read -> Bool,
        can_write -> Bool,
    }
}

diesel::allow_tables_to_appear_in_same_query!(exempteds, students, subjects, privileges);
