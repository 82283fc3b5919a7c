//! 에러 코드 상수 정의
//!
//! UI 레이어에서 i18n 처리를 위해 에러 코드를 문자열로 반환합니다.

/// 원본 폴더가 존재하지 않음
pub const ERR_SOURCE_NOT_FOUND: &str = "ERR_SOURCE_NOT_FOUND";

/// 원본 경로가 디렉토리가 아님
pub const ERR_SOURCE_NOT_DIRECTORY: &str = "ERR_SOURCE_NOT_DIRECTORY";

/// 원본과 대상이 같은 폴더
pub const ERR_SAME_FOLDER: &str = "ERR_SAME_FOLDER";

/// 원본과 대상이 서로 중첩됨
pub const ERR_NESTED_PATHS: &str = "ERR_NESTED_PATHS";

/// 원본이 `_old` 백업 경로와 겹침
pub const ERR_BACKUP_OVERLAP: &str = "ERR_BACKUP_OVERLAP";

/// 네트워크 대상에 연결할 수 없음
pub const ERR_NETWORK_UNREACHABLE: &str = "ERR_NETWORK_UNREACHABLE";

/// 네트워크 모드인데 호스트가 지정되지 않음
pub const ERR_NETWORK_HOST_MISSING: &str = "ERR_NETWORK_HOST_MISSING";

/// 입력값 검증 실패
pub const ERR_INVALID_INPUT: &str = "ERR_INVALID_INPUT";

/// 이미 복사 작업이 진행 중
pub const ERR_ALREADY_RUNNING: &str = "ERR_ALREADY_RUNNING";

/// 기존 폴더 백업(회전) 실패
pub const ERR_BACKUP_FAILED: &str = "ERR_BACKUP_FAILED";

/// 파일 복사 실패
pub const ERR_COPY_FAILED: &str = "ERR_COPY_FAILED";

/// 복사 실패 후 복원까지 실패 (수동 복구 필요)
pub const ERR_RESTORE_FAILED: &str = "ERR_RESTORE_FAILED";
